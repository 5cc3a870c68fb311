use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::model::room::RoomCode;

/// Epoch milliseconds, carried on messages for debugging and display.
/// Ordering is guaranteed by the channel itself, not by these.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Clinical events exchanged over the reliable in-session data channel.
///
/// Unknown `type` tags decode to [`AppMessage::Unknown`] so that a newer
/// peer can introduce message kinds without breaking an older one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AppMessage {
    /// Doctor asks the patient to begin a facial scan.
    #[serde(rename_all = "camelCase")]
    FaceScanRequest { room_id: RoomCode, timestamp: u64 },
    /// Progress or notification text (scan progress, prescription-created,
    /// diagnosis-created, lab-request-created), optionally with a structured
    /// payload.
    #[serde(rename_all = "camelCase")]
    FaceScanStatus {
        status: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
        timestamp: u64,
    },
    /// Terminal scan outcome, forwarded verbatim from the scan provider.
    #[serde(rename_all = "camelCase")]
    FaceScanResults { results: Value, status: String },
    /// Identity handshake sent by the patient once the channel opens.
    #[serde(rename_all = "camelCase")]
    PatientInfo {
        patient_name: String,
        patient_id: u64,
        email: String,
        timestamp: u64,
    },
    /// Reciprocal identity handshake sent by the doctor.
    #[serde(rename_all = "camelCase")]
    DoctorInfo {
        doctor_name: String,
        specialization: String,
        bio: String,
    },
    #[serde(other)]
    Unknown,
}

impl AppMessage {
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
