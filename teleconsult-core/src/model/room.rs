use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

pub const ROOM_CODE_LEN: usize = 6;

/// Short human-typeable rendezvous token. Generated client-side by the
/// hosting party; the relay treats it as an opaque key.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

#[derive(Debug, Error, PartialEq)]
pub enum InvalidRoomCode {
    #[error("room code must be {ROOM_CODE_LEN} characters, got {0}")]
    WrongLength(usize),
    #[error("room code must be alphanumeric")]
    NotAlphanumeric,
}

impl RoomCode {
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(hex[..ROOM_CODE_LEN].to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RoomCode {
    type Err = InvalidRoomCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != ROOM_CODE_LEN {
            return Err(InvalidRoomCode::WrongLength(s.len()));
        }
        if !s.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(InvalidRoomCode::NotAlphanumeric);
        }
        Ok(Self(s.to_ascii_uppercase()))
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
