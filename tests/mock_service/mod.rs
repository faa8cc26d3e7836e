//! Mock Listen Doctor backend pieces for integration tests.
//!
//! - HTTP endpoints are mocked per test with wiremock
//! - The realtime channel is an in-process Socket.IO server ([`SocketIoMock`])

// Not every test binary uses every helper
#![allow(dead_code)]

pub mod socketio_mock;

use std::time::Duration;

use listendoctor_client::ObserverCallback;
use listendoctor_client::observer_fn;
use tokio::sync::mpsc;

pub use socketio_mock::{Heartbeat, MockBehavior, SocketIoMock};

/// Observer forwarding every message into a channel the test can await.
pub fn capture_observer() -> (ObserverCallback, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback = observer_fn(move |message| {
        let _ = tx.send(message);
    });
    (callback, rx)
}

/// Next observer message, failing the test after two seconds.
pub async fn next_message(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("Timed out waiting for observer message")
        .expect("Observer channel closed")
}
