use crate::utils::MockRelay;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use teleconsult_client::{
    NegotiationState, PeerSession, RoleProfile, SessionConfig, SessionController, SessionEvent,
    SessionNotice, SyntheticSource,
};
use teleconsult_core::RoomCode;
use tokio::sync::mpsc;

pub fn doctor_profile() -> RoleProfile {
    RoleProfile::Doctor {
        name: "Dr. Smith".to_string(),
        specialization: "Cardiology".to_string(),
        bio: "20 years of practice".to_string(),
    }
}

pub fn patient_profile() -> RoleProfile {
    RoleProfile::Patient {
        name: "Jane Doe".to_string(),
        id: 4,
        email: "jane@example.com".to_string(),
    }
}

pub struct ControllerPair {
    pub doctor: SessionController,
    pub patient: SessionController,
    pub doctor_notices: mpsc::UnboundedReceiver<SessionNotice>,
    pub patient_notices: mpsc::UnboundedReceiver<SessionNotice>,
    pub room: RoomCode,
}

/// Wire a doctor and a patient through the mock relay and wait until both
/// sides report an open data channel.
pub async fn connect_pair(relay: &MockRelay) -> Result<ControllerPair> {
    let doctor = SessionController::new(
        doctor_profile(),
        SessionConfig::default(),
        relay.endpoint(),
        Arc::new(SyntheticSource),
    );
    let patient = SessionController::new(
        patient_profile(),
        SessionConfig::default(),
        relay.endpoint(),
        Arc::new(SyntheticSource),
    );
    let mut doctor_notices = doctor.notices().context("doctor notices taken")?;
    let mut patient_notices = patient.notices().context("patient notices taken")?;

    let room = doctor.host_room();
    let ack = doctor.join(room.clone()).await?;
    assert_eq!(ack.participant_count, 1);
    let ack = patient.join(room.clone()).await?;
    assert_eq!(ack.participant_count, 2);

    wait_for_notice(
        &mut doctor_notices,
        |n| matches!(n, SessionNotice::ChannelOpen),
        20_000,
    )
    .await
    .context("doctor data channel never opened")?;
    wait_for_notice(
        &mut patient_notices,
        |n| matches!(n, SessionNotice::ChannelOpen),
        20_000,
    )
    .await
    .context("patient data channel never opened")?;

    Ok(ControllerPair {
        doctor,
        patient,
        doctor_notices,
        patient_notices,
        room,
    })
}

/// Drain notices until one matches, bounded by a deadline.
pub async fn wait_for_notice<F>(
    rx: &mut mpsc::UnboundedReceiver<SessionNotice>,
    pred: F,
    timeout_ms: u64,
) -> Option<SessionNotice>
where
    F: Fn(&SessionNotice) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return None;
        }
        match tokio::time::timeout(remaining, rx.recv()).await {
            Ok(Some(notice)) if pred(&notice) => return Some(notice),
            Ok(Some(_)) => continue,
            Ok(None) | Err(_) => return None,
        }
    }
}

pub struct SessionHarness {
    pub session: Arc<PeerSession>,
    pub events: mpsc::Receiver<SessionEvent>,
}

/// Bare peer session with no ICE servers: candidates come off the loopback
/// and local interfaces, which is all an in-process pair needs.
pub async fn new_session() -> SessionHarness {
    let (tx, events) = mpsc::channel(64);
    let session = Arc::new(
        PeerSession::new(&[], tx)
            .await
            .expect("failed to build peer session"),
    );
    SessionHarness { session, events }
}

/// Forward candidates to the other side and hand everything else back for
/// inspection.
pub fn route_events(
    mut rx: mpsc::Receiver<SessionEvent>,
    other: Arc<PeerSession>,
) -> mpsc::UnboundedReceiver<SessionEvent> {
    let (tx, out) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(evt) = rx.recv().await {
            match evt {
                SessionEvent::CandidateGenerated(json) => {
                    let _ = other.add_remote_candidate(json).await;
                }
                other_evt => {
                    if tx.send(other_evt).is_err() {
                        break;
                    }
                }
            }
        }
    });
    out
}

/// Drain session events until the wanted state shows up.
pub async fn wait_for_state(
    rx: &mut mpsc::UnboundedReceiver<SessionEvent>,
    want: NegotiationState,
    timeout_ms: u64,
) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return false;
        }
        match tokio::time::timeout(remaining, rx.recv()).await {
            Ok(Some(SessionEvent::StateChanged(state))) if state == want => return true,
            Ok(Some(_)) => continue,
            Ok(None) | Err(_) => return false,
        }
    }
}
