//! Opens a framed WebSocket session, sends a few messages and logs everything received.
//!
//! Run with tracing enabled:
//! ```sh
//! WS_URL=wss://example.com/hub RUST_LOG=debug,rustls=off cargo run --example websocket --features ws,tracing
//! ```
//!
//! Optionally log to a file:
//! ```sh
//! LOG_FILE=websocket.log WS_URL=wss://example.com/hub RUST_LOG=debug,rustls=off cargo run --example websocket --features ws,tracing
//! ```

use std::fs::File;
use std::time::Duration;

use bgr_network::types::{Parameters, json};
use bgr_network::ws::{RECORD_SEPARATOR, Session, SessionState, WebSocketSpec};
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Ok(path) = std::env::var("LOG_FILE") {
        let file = File::create(path)?;
        tracing_subscriber::registry()
            .with(EnvFilter::from_default_env())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(file)
                    .with_ansi(false),
            )
            .init();
    } else {
        tracing_subscriber::fmt::init();
    }

    let url = std::env::var("WS_URL").unwrap_or_else(|_| "ws://127.0.0.1:5000/hub".to_owned());
    let spec = WebSocketSpec::builder()
        .url(url)
        .handshake(Parameters::new().with("protocol", "json").with("version", 1))
        .build();

    let session = Session::new(spec);
    session.on_message(|text| {
        // One frame may carry several separator-terminated records
        for record in text.split(RECORD_SEPARATOR).filter(|r| !r.is_empty()) {
            info!(record, "received");
        }
    });

    let (connected_tx, connected_rx) = oneshot::channel();
    session.connect(move |connected| {
        _ = connected_tx.send(connected);
    });
    if !connected_rx.await? {
        warn!(state = ?session.state(), "unable to connect");
        return Ok(());
    }

    session.send_json(&json!({ "type": 6 }))?;
    session.send_json(&json!({
        "type": 1,
        "target": "SendMessage",
        "arguments": ["demo", "hello"]
    }))?;

    // Wait for the peer to answer or hang up
    let mut state_rx = session.state_receiver();
    let closed = tokio::time::timeout(
        Duration::from_secs(10),
        state_rx.wait_for(|state| *state == SessionState::Closed),
    )
    .await;
    if closed.is_err() {
        info!("closing");
        session.close();
    }

    info!(state = ?session.state(), "done");

    Ok(())
}
