use std::sync::Arc;
use teleconsult_client::{SessionConfig, SessionController, SessionError, SyntheticSource};

use crate::integration::init_tracing;
use crate::utils::{
    DeniedSource, MissingSource, MockRelay, UnreachableRendezvous, doctor_profile,
    patient_profile,
};

/// A refused permission prompt is a camera error, not a network error, and
/// the controller stays out of the room.
#[tokio::test]
async fn camera_denial_is_distinct_and_leaves_nothing_joined() {
    init_tracing();

    let relay = MockRelay::new();
    let controller = SessionController::new(
        patient_profile(),
        SessionConfig::default(),
        relay.endpoint(),
        Arc::new(DeniedSource),
    );

    let err = controller.join(controller.host_room()).await.unwrap_err();
    assert!(matches!(err, SessionError::CameraDenied));
    assert!(!controller.is_joined());
}

#[tokio::test]
async fn missing_device_reports_camera_not_found() {
    init_tracing();

    let relay = MockRelay::new();
    let controller = SessionController::new(
        patient_profile(),
        SessionConfig::default(),
        relay.endpoint(),
        Arc::new(MissingSource),
    );

    let err = controller.join(controller.host_room()).await.unwrap_err();
    assert!(matches!(err, SessionError::CameraNotFound));
    assert!(!controller.is_joined());
}

#[tokio::test]
async fn unreachable_relay_reports_a_network_error() {
    init_tracing();

    let controller = SessionController::new(
        doctor_profile(),
        SessionConfig::default(),
        Arc::new(UnreachableRendezvous),
        Arc::new(SyntheticSource),
    );

    let err = controller.join(controller.host_room()).await.unwrap_err();
    assert!(matches!(err, SessionError::Network(_)));
    assert!(!controller.is_joined());
}

/// The third arrival is turned away: consultations are two-party.
#[tokio::test]
async fn third_joiner_is_rejected_with_room_full() {
    init_tracing();

    let relay = MockRelay::new();
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
    let intruder = SessionController::new(
        patient_profile(),
        SessionConfig::default(),
        relay.endpoint(),
        Arc::new(SyntheticSource),
    );

    let room = doctor.host_room();
    doctor.join(room.clone()).await.expect("doctor join");
    patient.join(room.clone()).await.expect("patient join");

    let err = intruder.join(room.clone()).await.unwrap_err();
    assert!(matches!(err, SessionError::RoomFull(_)));
    assert!(!intruder.is_joined());

    doctor.leave().await;
    patient.leave().await;
}
