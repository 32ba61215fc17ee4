//! Persistent WebSocket sessions with record-separator framing.
//!
//! **Feature flag:** `ws` (required to use this module)
//!
//! # Architecture
//!
//! - [`WebSocketSpec`]: URL, upgrade headers and the handshake payload of one session
//! - [`Session`]: connects, sends the handshake, then runs a receive loop that hands every
//!   inbound text frame to a single registered observer
//!
//! Every outgoing text frame is terminated with [`RECORD_SEPARATOR`] (`U+001E`), the framing
//! the remote messaging protocol expects. Inbound frames are forwarded verbatim.
//!
//! # Example
//!
//! ```no_run
//! use bgr_network::types::Parameters;
//! use bgr_network::ws::{Session, WebSocketSpec};
//!
//! # async fn example() -> bgr_network::Result<()> {
//! let spec = WebSocketSpec::builder()
//!     .url("wss://chat.example.com/hub")
//!     .handshake(Parameters::new().with("protocol", "json").with("version", 1))
//!     .build();
//!
//! let session = Session::new(spec);
//! session.on_message(|text| println!("received {text}"));
//! session.open().await?;
//!
//! session.send(r#"{"type":1,"target":"ping","arguments":[]}"#);
//! session.close();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod session;
pub mod spec;

#[expect(
    clippy::module_name_repetitions,
    reason = "WsError includes module name for clarity when used outside this module"
)]
pub use error::WsError;
pub use session::{Session, SessionState};
pub use spec::WebSocketSpec;

/// Terminator appended to every outgoing text frame.
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// Appends [`RECORD_SEPARATOR`] to `text`.
#[must_use]
pub fn frame(text: &str) -> String {
    let mut framed = String::with_capacity(text.len() + RECORD_SEPARATOR.len_utf8());
    framed.push_str(text);
    framed.push(RECORD_SEPARATOR);
    framed
}
