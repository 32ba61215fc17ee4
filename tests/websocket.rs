#![cfg(feature = "ws")]
#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests"
)]

mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bgr_network::types::Parameters;
use bgr_network::ws::{Session, SessionState, WebSocketSpec};
use futures_util::{SinkExt as _, StreamExt as _};
use tokio::io::AsyncWriteExt as _;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

/// What the mock server saw from a client.
#[derive(Debug, PartialEq)]
enum Inbound {
    Text(String),
    Close(Option<CloseCode>),
}

/// What the mock server should do next on every open connection.
#[derive(Debug, Clone)]
enum Outbound {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    /// Drop the TCP connection without a close frame
    Drop,
}

/// Mock WebSocket server.
struct MockWsServer {
    addr: SocketAddr,
    /// Broadcast commands to ALL connected clients
    outbound_tx: broadcast::Sender<Outbound>,
    /// Receives frames sent by clients
    inbound_rx: mpsc::UnboundedReceiver<Inbound>,
    /// Receives the `(uri, authorization)` of every upgrade request
    upgrade_rx: mpsc::UnboundedReceiver<(String, Option<String>)>,
}

impl MockWsServer {
    /// Start a mock WebSocket server on a random port.
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (outbound_tx, _) = broadcast::channel::<Outbound>(100);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<Inbound>();
        let (upgrade_tx, upgrade_rx) = mpsc::unbounded_channel();

        let broadcast_tx = outbound_tx.clone();

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };

                let upgrade_tx = upgrade_tx.clone();
                let on_upgrade = move |request: &Request,
                                       response: Response|
                      -> Result<Response, ErrorResponse> {
                    let authorization = request
                        .headers()
                        .get("authorization")
                        .and_then(|value| value.to_str().ok())
                        .map(str::to_owned);
                    drop(upgrade_tx.send((request.uri().to_string(), authorization)));
                    Ok(response)
                };

                let Ok(ws_stream) = tokio_tungstenite::accept_hdr_async(stream, on_upgrade).await
                else {
                    continue;
                };

                let (mut write, mut read) = ws_stream.split();
                let inbound_tx = inbound_tx.clone();
                let mut outbound_rx = broadcast_tx.subscribe();

                tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            msg = read.next() => {
                                match msg {
                                    Some(Ok(Message::Text(text))) => {
                                        drop(inbound_tx.send(Inbound::Text(text.to_string())));
                                    }
                                    Some(Ok(Message::Close(frame))) => {
                                        drop(inbound_tx.send(Inbound::Close(frame.map(|f| f.code))));
                                        break;
                                    }
                                    Some(Ok(_)) => {}
                                    _ => break,
                                }
                            }
                            command = outbound_rx.recv() => {
                                match command {
                                    Ok(Outbound::Text(text)) => {
                                        if write.send(Message::Text(text.into())).await.is_err() {
                                            break;
                                        }
                                    }
                                    Ok(Outbound::Binary(data)) => {
                                        if write.send(Message::Binary(data.into())).await.is_err() {
                                            break;
                                        }
                                    }
                                    Ok(Outbound::Ping(data)) => {
                                        if write.send(Message::Ping(data.into())).await.is_err() {
                                            break;
                                        }
                                    }
                                    Ok(Outbound::Drop) | Err(_) => break,
                                }
                            }
                        }
                    }
                });
            }
        });

        Self {
            addr,
            outbound_tx,
            inbound_rx,
            upgrade_rx,
        }
    }

    fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    /// Send a text frame to all connected clients.
    fn send(&self, message: &str) {
        drop(self.outbound_tx.send(Outbound::Text(message.to_owned())));
    }

    /// Send a raw server command to all connected clients.
    fn command(&self, command: Outbound) {
        drop(self.outbound_tx.send(command));
    }

    /// Drop every connection without a closing handshake.
    fn drop_connections(&self) {
        drop(self.outbound_tx.send(Outbound::Drop));
    }

    /// Receive the next frame a client sent.
    async fn recv(&mut self) -> Option<Inbound> {
        timeout(Duration::from_secs(2), self.inbound_rx.recv())
            .await
            .ok()
            .flatten()
    }

    async fn recv_upgrade(&mut self) -> Option<(String, Option<String>)> {
        timeout(Duration::from_secs(2), self.upgrade_rx.recv())
            .await
            .ok()
            .flatten()
    }
}

/// Collects observer deliveries into a channel.
fn collecting_observer(session: &Session) -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    session.on_message(move |text| drop(tx.send(text)));
    rx
}

async fn next_delivery(rx: &mut mpsc::UnboundedReceiver<String>) -> Option<String> {
    timeout(Duration::from_secs(2), rx.recv()).await.ok().flatten()
}

async fn wait_for_state(session: &Session, expected: SessionState) {
    let mut state_rx = session.state_receiver();
    timeout(
        Duration::from_secs(2),
        state_rx.wait_for(|state| *state == expected),
    )
    .await
    .unwrap()
    .unwrap();
}

mod handshake {
    use super::*;

    #[tokio::test]
    async fn handshake_should_be_first_frame() {
        let mut server = MockWsServer::start().await;

        let spec = WebSocketSpec::builder()
            .url(server.ws_url("/hub?id=42"))
            .handshake(Parameters::new().with("protocol", "json").with("version", 1))
            .headers(vec![("Authorization".to_owned(), "Bearer token".to_owned())])
            .build();
        let session = Session::new(spec);

        session.open().await.unwrap();
        assert_eq!(session.state(), SessionState::Open);

        let (uri, authorization) = server.recv_upgrade().await.unwrap();
        assert_eq!(uri, "/hub?id=42");
        assert_eq!(authorization.as_deref(), Some("Bearer token"));

        let first = server.recv().await.unwrap();
        assert_eq!(
            first,
            Inbound::Text("{\"protocol\":\"json\",\"version\":1}\u{1e}".to_owned())
        );

        session.close();
    }

    #[tokio::test]
    async fn connect_should_report_success_once() {
        let server = MockWsServer::start().await;
        let session = Session::new(WebSocketSpec::builder().url(server.ws_url("/hub")).build());

        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = oneshot::channel();
        let calls_clone = Arc::clone(&calls);

        session
            .connect(move |connected| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                drop(tx.send(connected));
            })
            .await
            .unwrap();

        assert!(rx.await.unwrap(), "connected");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), SessionState::Open);

        session.close();
    }

    #[tokio::test]
    async fn unreachable_endpoint_should_report_failure() {
        let addr = common::unused_addr();
        let session = Session::new(
            WebSocketSpec::builder()
                .url(format!("ws://{addr}/hub"))
                .build(),
        );

        let (tx, rx) = oneshot::channel();
        session
            .connect(move |connected| drop(tx.send(connected)))
            .await
            .unwrap();

        assert!(!rx.await.unwrap(), "connection refused");
        assert_eq!(session.state(), SessionState::Closed);
    }
}

mod messaging {
    use super::*;

    #[tokio::test]
    async fn send_should_append_record_separator() {
        let mut server = MockWsServer::start().await;
        let session = Session::new(WebSocketSpec::builder().url(server.ws_url("/hub")).build());

        session.open().await.unwrap();
        assert_eq!(server.recv().await, Some(Inbound::Text("{}\u{1e}".to_owned())));

        session.send("hello");
        session.send_json(&serde_json::json!({ "type": 6 })).unwrap();

        assert_eq!(server.recv().await, Some(Inbound::Text("hello\u{1e}".to_owned())));
        assert_eq!(
            server.recv().await,
            Some(Inbound::Text("{\"type\":6}\u{1e}".to_owned()))
        );

        session.close();
    }

    #[tokio::test]
    async fn frames_should_reach_observer_in_order() {
        let mut server = MockWsServer::start().await;
        let session = Session::new(WebSocketSpec::builder().url(server.ws_url("/hub")).build());
        let mut deliveries = collecting_observer(&session);

        session.open().await.unwrap();
        assert!(matches!(server.recv().await, Some(Inbound::Text(_))));

        let expected: Vec<String> = (0..20).map(|i| format!("message {i}\u{1e}")).collect();
        for message in &expected {
            server.send(message);
        }

        let mut received = Vec::new();
        while received.len() < expected.len() {
            received.push(next_delivery(&mut deliveries).await.unwrap());
        }

        // Frames are forwarded verbatim, separator included
        assert_eq!(received, expected);

        session.close();
    }

    #[tokio::test]
    async fn observer_should_be_replaced() {
        let mut server = MockWsServer::start().await;
        let session = Session::new(WebSocketSpec::builder().url(server.ws_url("/hub")).build());
        let mut first = collecting_observer(&session);

        session.open().await.unwrap();
        assert!(matches!(server.recv().await, Some(Inbound::Text(_))));

        server.send("one");
        assert_eq!(next_delivery(&mut first).await.as_deref(), Some("one"));

        let mut second = collecting_observer(&session);
        server.send("two");

        assert_eq!(next_delivery(&mut second).await.as_deref(), Some("two"));
        assert!(first.try_recv().is_err(), "replaced observer stays silent");

        session.close();
    }

    #[tokio::test]
    async fn non_text_frames_should_not_stop_delivery() {
        let mut server = MockWsServer::start().await;
        let session = Session::new(WebSocketSpec::builder().url(server.ws_url("/hub")).build());
        let mut deliveries = collecting_observer(&session);

        session.open().await.unwrap();
        assert!(matches!(server.recv().await, Some(Inbound::Text(_))));

        server.command(Outbound::Binary(vec![1, 2, 3]));
        server.command(Outbound::Ping(vec![9]));
        server.send("after");

        assert_eq!(next_delivery(&mut deliveries).await.as_deref(), Some("after"));
        assert!(deliveries.try_recv().is_err(), "only text frames are delivered");
        assert_eq!(session.state(), SessionState::Open);

        session.close();
    }

    #[tokio::test]
    async fn send_after_close_should_be_ignored() {
        let mut server = MockWsServer::start().await;
        let session = Session::new(WebSocketSpec::builder().url(server.ws_url("/hub")).build());

        session.open().await.unwrap();
        assert!(matches!(server.recv().await, Some(Inbound::Text(_))));

        session.close();
        session.send("late");

        assert_eq!(server.recv().await, Some(Inbound::Close(Some(CloseCode::Away))));
        assert_eq!(server.recv().await, None, "nothing after the close frame");
    }
}

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn close_should_send_going_away() {
        let mut server = MockWsServer::start().await;
        let session = Session::new(WebSocketSpec::builder().url(server.ws_url("/hub")).build());

        session.open().await.unwrap();
        assert!(matches!(server.recv().await, Some(Inbound::Text(_))));

        session.close();

        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(server.recv().await, Some(Inbound::Close(Some(CloseCode::Away))));
    }

    #[tokio::test]
    async fn abrupt_disconnect_should_close_session() {
        let mut server = MockWsServer::start().await;
        let session = Session::new(WebSocketSpec::builder().url(server.ws_url("/hub")).build());

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        session.on_message(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        session.open().await.unwrap();
        assert!(matches!(server.recv().await, Some(Inbound::Text(_))));

        server.drop_connections();
        wait_for_state(&session, SessionState::Closed).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        session.send("ignored");
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn receive_failure_should_end_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (server_tx, server_rx) = oneshot::channel();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws_stream = tokio_tungstenite::accept_async(stream).await.unwrap();

            // Handshake frame
            ws_stream.next().await.unwrap().unwrap();

            // A text frame with the reserved bits set, then a well-formed text frame "late",
            // written straight to the socket so the connection stays writable
            ws_stream
                .get_mut()
                .write_all(&[0xF1, 0x00, 0x81, 0x04, b'l', b'a', b't', b'e'])
                .await
                .unwrap();

            drop(server_tx.send(ws_stream));
        });

        let session = Session::new(
            WebSocketSpec::builder()
                .url(format!("ws://{addr}/hub"))
                .build(),
        );
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        session.on_message(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        session.open().await.unwrap();
        wait_for_state(&session, SessionState::Closed).await;
        let mut ws_stream = timeout(Duration::from_secs(2), server_rx)
            .await
            .unwrap()
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(
            calls.load(Ordering::SeqCst),
            0,
            "frames after the failure are never delivered"
        );

        // The writer stops with the session and releases the socket, while `session` is alive
        timeout(Duration::from_secs(2), ws_stream.next())
            .await
            .expect("connection released once the session closed");
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn open_after_close_should_fail() {
        let server = MockWsServer::start().await;
        let session = Session::new(WebSocketSpec::builder().url(server.ws_url("/hub")).build());

        session.open().await.unwrap();
        session.close();

        let error = session.open().await.unwrap_err();
        assert_eq!(error.kind(), bgr_network::error::Kind::WebSocket);
    }
}
