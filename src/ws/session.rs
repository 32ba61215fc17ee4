use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt as _, StreamExt as _};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::error::WsError;
use super::frame;
use super::spec::WebSocketSpec;
use crate::Result;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

type Observer = Arc<dyn Fn(String) + Send + Sync>;

/// Lifecycle of a [`Session`].
///
/// Sessions only move forward: `Idle → Connecting → Open → Closed`, or straight from
/// `Connecting` to `Closed` when the connection or handshake fails. There is no reconnection.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, `open` not called yet
    Idle,
    /// Socket being established or handshake being sent
    Connecting,
    /// Handshake sent, receive loop running
    Open,
    /// Closed by the caller, by the peer, or after a receive failure
    Closed,
}

impl SessionState {
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }
}

/// One persistent WebSocket connection.
///
/// After [`open`](Self::open) succeeds, a background task reads frames until the connection
/// fails or ends, handing each text frame to the observer registered with
/// [`on_message`](Self::on_message). Observer calls happen one at a time, in arrival order.
/// Outgoing frames are queued to a writer task and always end with the record separator.
///
/// Clones share the same connection.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    spec: WebSocketSpec,
    /// Shared with the receive loop so it can report termination
    state_tx: Arc<watch::Sender<SessionState>>,
    /// Queue into the writer task, set once the socket is open
    sender_tx: OnceLock<mpsc::UnboundedSender<Message>>,
    /// Shared with the receive loop; replaced wholesale on registration
    observer: Arc<RwLock<Option<Observer>>>,
}

impl Session {
    #[must_use]
    pub fn new(spec: WebSocketSpec) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Idle);

        Self {
            inner: Arc::new(SessionInner {
                spec,
                state_tx: Arc::new(state_tx),
                sender_tx: OnceLock::new(),
                observer: Arc::new(RwLock::new(None)),
            }),
        }
    }

    #[must_use]
    pub fn spec(&self) -> &WebSocketSpec {
        &self.inner.spec
    }

    /// Get the current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.inner.state_tx.borrow()
    }

    /// Subscribe to session state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<SessionState> {
        self.inner.state_tx.subscribe()
    }

    /// Registers the observer for inbound text frames, replacing any previous one.
    pub fn on_message<F>(&self, observer: F)
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        *self
            .inner
            .observer
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(observer));
    }

    /// Connects, sends the handshake frame and starts the receive loop.
    ///
    /// The handshake is only sent once the socket is established, and the session becomes
    /// [`Open`](SessionState::Open) only after it was written. Any failure leaves the session
    /// [`Closed`](SessionState::Closed).
    ///
    /// # Errors
    ///
    /// Returns a [`Kind::WebSocket`](crate::error::Kind::WebSocket) error if the session was
    /// already started, the URL or headers are invalid, the connection cannot be established,
    /// or the handshake cannot be sent.
    pub async fn open(&self) -> Result<()> {
        let started = self.inner.state_tx.send_if_modified(|state| {
            if *state == SessionState::Idle {
                *state = SessionState::Connecting;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(WsError::AlreadyStarted(self.state()).into());
        }

        let result = self.establish().await;
        if result.is_err() {
            self.inner.state_tx.send_replace(SessionState::Closed);
        }

        result
    }

    /// Spawns [`open`](Self::open) and reports its outcome to `on_connected` exactly once.
    ///
    /// Failure details are only available through `tracing`. Must be called from within a
    /// tokio runtime.
    pub fn connect<F>(&self, on_connected: F) -> JoinHandle<()>
    where
        F: FnOnce(bool) + Send + 'static,
    {
        let session = self.clone();

        tokio::spawn(async move {
            let result = session.open().await;

            #[cfg(feature = "tracing")]
            match &result {
                Ok(()) => tracing::info!(url = session.spec().url(), "WebSocket connected"),
                Err(e) => tracing::warn!(url = session.spec().url(), error = %e, "Unable to connect"),
            }

            on_connected(result.is_ok());
        })
    }

    /// Sends `text` followed by the record separator as a text frame.
    ///
    /// Ignored unless the session is [`Open`](SessionState::Open).
    pub fn send(&self, text: &str) {
        let Some(sender_tx) = self.inner.sender_tx.get().filter(|_| self.state().is_open()) else {
            #[cfg(feature = "tracing")]
            tracing::debug!(state = ?self.state(), "Ignoring send on a session that is not open");
            return;
        };

        if sender_tx.send(Message::Text(frame(text).into())).is_err() {
            #[cfg(feature = "tracing")]
            tracing::warn!("WebSocket writer has stopped, message dropped");
        }
    }

    /// Serializes `payload` to JSON and [`send`](Self::send)s it.
    pub fn send_json<R: Serialize>(&self, payload: &R) -> Result<()> {
        let json = serde_json::to_string(payload).map_err(WsError::Serialization)?;
        self.send(&json);
        Ok(())
    }

    /// Requests a graceful shutdown with a "going away" close frame.
    pub fn close(&self) {
        // Queued before the state change so the writer sends it before it stops
        if self.state().is_open()
            && let Some(sender_tx) = self.inner.sender_tx.get()
        {
            let close_frame = CloseFrame {
                code: CloseCode::Away,
                reason: "going away".into(),
            };
            // The writer may already be gone if the peer closed first
            _ = sender_tx.send(Message::Close(Some(close_frame)));
        }

        self.inner.state_tx.send_replace(SessionState::Closed);

        #[cfg(feature = "tracing")]
        tracing::debug!(url = self.spec().url(), "WebSocket closed");
    }

    async fn establish(&self) -> Result<()> {
        let request = self.inner.spec.client_request()?;
        let handshake = self.inner.spec.handshake_frame()?;

        let (ws_stream, _) = connect_async(request).await?;
        let (mut write, read) = ws_stream.split();

        write.send(Message::Text(handshake.into())).await?;

        let (sender_tx, sender_rx) = mpsc::unbounded_channel();
        _ = self.inner.sender_tx.set(sender_tx);

        let opened = self.inner.state_tx.send_if_modified(|state| {
            if *state == SessionState::Connecting {
                *state = SessionState::Open;
                true
            } else {
                false
            }
        });
        if !opened {
            // Closed while connecting
            _ = write.close().await;
            return Err(WsError::ConnectionClosed.into());
        }

        tokio::spawn(write_loop(write, sender_rx, self.inner.state_tx.subscribe()));
        tokio::spawn(receive_loop(
            read,
            Arc::clone(&self.inner.observer),
            Arc::clone(&self.inner.state_tx),
        ));

        Ok(())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("spec", &self.inner.spec)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Drains the outgoing queue into the socket until the session closes, the queue closes or a
/// close frame is sent.
///
/// Frames queued before the session closed are written first.
async fn write_loop(
    mut write: SplitSink<WsStream, Message>,
    mut sender_rx: mpsc::UnboundedReceiver<Message>,
    mut state_rx: watch::Receiver<SessionState>,
) {
    loop {
        let message = tokio::select! {
            biased;

            message = sender_rx.recv() => match message {
                Some(message) => message,
                None => break,
            },
            _ = state_rx.wait_for(|state| *state == SessionState::Closed) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Session closed, stopping WebSocket writer");
                break;
            }
        };
        let is_close = message.is_close();

        if let Err(e) = write.send(message).await {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %e, "Message sending error");
            #[cfg(not(feature = "tracing"))]
            let _ = &e;
            break;
        }

        #[cfg(feature = "tracing")]
        tracing::trace!("Message sent");

        if is_close {
            break;
        }
    }

    _ = write.close().await;
}

/// Reads frames until the connection fails or ends.
///
/// Each iteration waits for exactly one frame and is re-armed before the next observer call can
/// happen, so delivery is sequential. A read error is terminal.
async fn receive_loop(
    mut read: SplitStream<WsStream>,
    observer: Arc<RwLock<Option<Observer>>>,
    state_tx: Arc<watch::Sender<SessionState>>,
) {
    while let Some(frame) = read.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                #[cfg(feature = "tracing")]
                tracing::trace!(%text, "Received WebSocket text message");

                let current = observer
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                if let Some(observer) = current {
                    observer(text.as_str().to_owned());
                }
            }
            Ok(_) => {
                // Binary, ping/pong and close frames carry nothing for the observer
                #[cfg(feature = "tracing")]
                tracing::debug!("Ignoring non-text WebSocket frame");
            }
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %e, "WebSocket receive error");
                #[cfg(not(feature = "tracing"))]
                let _ = &e;
                break;
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::debug!("WebSocket receive loop ended");

    state_tx.send_replace(SessionState::Closed);
}
