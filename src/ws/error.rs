#![expect(
    clippy::module_name_repetitions,
    reason = "Error types include the module name to indicate their scope"
)]

use std::error::Error as StdError;
use std::fmt;

use super::session::SessionState;

/// WebSocket error variants.
#[non_exhaustive]
#[derive(Debug)]
pub enum WsError {
    /// The session URL could not be parsed
    InvalidUrl(url::ParseError),
    /// A header could not be added to the upgrade request
    InvalidHeader(String),
    /// Error connecting to or communicating with the WebSocket server
    Connection(tokio_tungstenite::tungstenite::Error),
    /// A payload could not be serialized to JSON text
    Serialization(serde_json::Error),
    /// `open` was called on a session that already left the idle state
    AlreadyStarted(SessionState),
    /// WebSocket connection was closed
    ConnectionClosed,
}

impl fmt::Display for WsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl(e) => write!(f, "Invalid WebSocket URL: {e}"),
            Self::InvalidHeader(name) => write!(f, "Invalid WebSocket header: {name}"),
            Self::Connection(e) => write!(f, "WebSocket connection error: {e}"),
            Self::Serialization(e) => write!(f, "Failed to serialize WebSocket payload: {e}"),
            Self::AlreadyStarted(state) => {
                write!(f, "WebSocket session already started, state is {state:?}")
            }
            Self::ConnectionClosed => write!(f, "WebSocket connection closed"),
        }
    }
}

impl StdError for WsError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::InvalidUrl(e) => Some(e),
            Self::Connection(e) => Some(e),
            Self::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

// Integration with main Error type
impl From<WsError> for crate::error::Error {
    fn from(e: WsError) -> Self {
        crate::error::Error::with_source(crate::error::Kind::WebSocket, e)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for crate::error::Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        crate::error::Error::with_source(crate::error::Kind::WebSocket, WsError::Connection(e))
    }
}
