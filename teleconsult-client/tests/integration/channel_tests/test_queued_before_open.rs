use std::sync::Arc;
use std::time::Duration;
use teleconsult_client::{AppChannel, SessionEvent};
use teleconsult_core::AppMessage;

use crate::integration::init_tracing;
use crate::utils::new_session;

/// Messages sent before the channel opens are queued and observed by the
/// other side only after open, in their original send order.
#[tokio::test]
async fn sends_before_open_flush_in_order() {
    init_tracing();

    let mut initiator = new_session().await;
    let mut responder = new_session().await;
    let channel = Arc::new(AppChannel::new());

    let first = AppMessage::PatientInfo {
        patient_name: "Jane Doe".to_string(),
        patient_id: 4,
        email: "jane@example.com".to_string(),
        timestamp: 1_700_000_000_000,
    };
    let second = AppMessage::FaceScanStatus {
        status: "waiting in lobby".to_string(),
        payload: None,
        timestamp: 1_700_000_000_001,
    };

    // No channel exists yet: both sends must queue, not vanish.
    channel.send(first.clone()).await;
    channel.send(second.clone()).await;
    assert!(!channel.is_open());

    let offer = initiator.session.start_offer(true).await.expect("offer");
    let answer = responder.session.accept_offer(offer).await.expect("answer");
    initiator.session.apply_answer(answer).await.expect("apply");

    // Pump both event streams by hand: candidates cross over, the
    // initiator's open event attaches the queued channel, the responder
    // collects inbound messages.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(20);
    let mut received = Vec::new();
    while received.len() < 2 {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {
                panic!("queued messages never arrived, got {received:?}");
            }
            evt = initiator.events.recv() => match evt {
                Some(SessionEvent::CandidateGenerated(json)) => {
                    let _ = responder.session.add_remote_candidate(json).await;
                }
                Some(SessionEvent::DataChannelOpened(dc)) => {
                    channel.attach(dc).await;
                }
                Some(_) => {}
                None => panic!("initiator events closed"),
            },
            evt = responder.events.recv() => match evt {
                Some(SessionEvent::CandidateGenerated(json)) => {
                    let _ = initiator.session.add_remote_candidate(json).await;
                }
                Some(SessionEvent::ChannelMessage(bytes)) => {
                    if let Some(msg) = AppChannel::decode(&bytes) {
                        received.push(msg);
                    }
                }
                Some(_) => {}
                None => panic!("responder events closed"),
            },
        }
    }

    assert_eq!(received, vec![first, second]);

    initiator.session.close().await;
    responder.session.close().await;
}
