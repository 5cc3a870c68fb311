use serde_json::json;
use teleconsult_core::AppMessage;

use crate::integration::init_tracing;
use crate::utils::{MockRelay, connect_pair, wait_for_notice};
use teleconsult_client::{ScanProviderEvent, SessionNotice};

/// Doctor requests a scan, the patient's provider finishes one, and the
/// result lands back at the doctor with the payload intact.
#[tokio::test]
async fn scan_request_and_results_round_trip() {
    init_tracing();

    let relay = MockRelay::new();
    let mut pair = connect_pair(&relay).await.expect("pair never connected");

    pair.doctor
        .send_scan_request()
        .await
        .expect("scan request failed");

    wait_for_notice(
        &mut pair.patient_notices,
        |n| matches!(n, SessionNotice::ScanRequested),
        15_000,
    )
    .await
    .expect("patient never saw the scan request");

    // The provider flow completes on the patient side; the controller
    // forwards the terminal payload over the channel.
    let payload = json!({
        "heartRate": 72,
        "breathingRate": 14,
        "stressLevel": "low",
    });
    pair.patient
        .scan_events()
        .publish(ScanProviderEvent::AnalysisFinished(payload.clone()));

    let notice = wait_for_notice(
        &mut pair.doctor_notices,
        |n| matches!(n, SessionNotice::Message(AppMessage::FaceScanResults { .. })),
        15_000,
    )
    .await
    .expect("doctor never received scan results");
    let SessionNotice::Message(AppMessage::FaceScanResults { results, status }) = notice else {
        unreachable!();
    };
    assert_eq!(results, payload);
    assert_eq!(status, "Face scan completed successfully!");

    pair.doctor.leave().await;
    pair.patient.leave().await;
}

/// A scan request coming from the patient role is refused outright.
#[tokio::test]
async fn patient_cannot_request_a_scan() {
    init_tracing();

    let relay = MockRelay::new();
    let pair = connect_pair(&relay).await.expect("pair never connected");

    let err = pair.patient.send_scan_request().await.unwrap_err();
    assert!(matches!(
        err,
        teleconsult_client::SessionError::WrongRole
    ));

    pair.doctor.leave().await;
    pair.patient.leave().await;
}
