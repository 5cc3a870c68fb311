use teleconsult_core::{AppMessage, PeerRole};

use crate::integration::init_tracing;
use crate::utils::{MockRelay, connect_pair, wait_for_notice};
use teleconsult_client::SessionNotice;

/// Doctor hosts, patient joins, the doctor initiates on peer-joined, and
/// both sides end up connected with the identity handshake delivered.
#[tokio::test]
async fn doctor_and_patient_reach_a_live_session() {
    init_tracing();

    let relay = MockRelay::new();
    let mut pair = connect_pair(&relay).await.expect("pair never connected");

    assert_eq!(pair.doctor.role(), PeerRole::Doctor);
    assert_eq!(pair.patient.role(), PeerRole::Patient);
    assert!(pair.doctor.is_joined());
    assert!(pair.patient.is_joined());

    // Identity goes out on channel open: the doctor learns who the patient
    // is and vice versa.
    let notice = wait_for_notice(
        &mut pair.doctor_notices,
        |n| matches!(n, SessionNotice::Message(AppMessage::PatientInfo { .. })),
        15_000,
    )
    .await
    .expect("doctor never received patient-info");
    let SessionNotice::Message(AppMessage::PatientInfo {
        patient_name,
        patient_id,
        email,
        ..
    }) = notice
    else {
        unreachable!();
    };
    assert_eq!(patient_name, "Jane Doe");
    assert_eq!(patient_id, 4);
    assert_eq!(email, "jane@example.com");

    wait_for_notice(
        &mut pair.patient_notices,
        |n| matches!(n, SessionNotice::Message(AppMessage::DoctorInfo { .. })),
        15_000,
    )
    .await
    .expect("patient never received doctor-info");

    pair.patient.leave().await;
    pair.doctor.leave().await;
}
