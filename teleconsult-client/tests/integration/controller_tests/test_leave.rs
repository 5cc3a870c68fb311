use crate::integration::init_tracing;
use crate::utils::{MockRelay, connect_pair, wait_for_notice};
use teleconsult_client::SessionNotice;

/// `leave` is safe to call from any state, any number of times.
#[tokio::test]
async fn leave_is_idempotent() {
    init_tracing();

    let relay = MockRelay::new();
    let mut pair = connect_pair(&relay).await.expect("pair never connected");

    for _ in 0..5 {
        pair.patient.leave().await;
    }
    assert!(!pair.patient.is_joined());

    // Exactly one Closed notice across the repeated calls.
    let first = wait_for_notice(
        &mut pair.patient_notices,
        |n| matches!(n, SessionNotice::Closed),
        5_000,
    )
    .await;
    assert!(first.is_some(), "expected a Closed notice");
    let second = wait_for_notice(
        &mut pair.patient_notices,
        |n| matches!(n, SessionNotice::Closed),
        1_000,
    )
    .await;
    assert!(second.is_none(), "leave must notify only once");

    pair.doctor.leave().await;
}

/// The remaining side sees peer-left, drops the remote stream, and keeps
/// running.
#[tokio::test]
async fn peer_departure_clears_the_remote_stream() {
    init_tracing();

    let relay = MockRelay::new();
    let mut pair = connect_pair(&relay).await.expect("pair never connected");

    pair.patient.leave().await;

    wait_for_notice(
        &mut pair.doctor_notices,
        |n| matches!(n, SessionNotice::PeerLeft),
        10_000,
    )
    .await
    .expect("doctor never learned the patient left");

    assert!(pair.doctor.remote_stream().is_none());
    assert!(pair.doctor.is_joined(), "the doctor is still in the room");

    pair.doctor.leave().await;
}
