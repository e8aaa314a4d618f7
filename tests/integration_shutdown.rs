#![allow(clippy::unwrap_used, clippy::panic, clippy::todo, clippy::missing_panics_doc, clippy::must_use_candidate, missing_debug_implementations, clippy::clone_on_ref_ptr, clippy::items_after_statements, unreachable_pub, clippy::print_stdout, clippy::similar_names)]
use std::time::Duration;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

mod common;

#[tokio::test]
async fn test_graceful_websocket_shutdown() {
    let app = common::TestApp::spawn().await;

    let user = app.register_user("shutdown_user").await;
    let mut ws = app.connect_online(&user).await;

    let _ = app.shutdown_tx.send(true);

    let mut close_received = false;
    let start = std::time::Instant::now();
    while start.elapsed() < Duration::from_secs(5) {
        if let Some(Ok(Message::Close(Some(cf)))) = ws.receive_raw_timeout(Duration::from_millis(100)).await {
            assert_eq!(cf.code, CloseCode::Away);
            assert_eq!(cf.reason, "Server shutting down");
            close_received = true;
            break;
        }
    }

    assert!(close_received, "Did not receive graceful close frame within timeout");
}
