//! Response decoding strategies.
//!
//! A [`Client`](crate::client::Client) is generic over its decoder. Any type implementing
//! [`Decode<T>`] for the response type of a [`RequestSpec<T>`](crate::request::RequestSpec) can
//! be used; [`JsonDecoder`] covers every [`DeserializeOwned`] type.

use serde::de::DeserializeOwned;

use crate::Result;
use crate::serde_helpers;

/// Turns a successful response body into a `T`.
///
/// Failures must be reported as [`Kind::Decoding`](crate::error::Kind::Decoding) errors.
///
/// # Example
///
/// ```
/// use bgr_network::Result;
/// use bgr_network::decode::Decode;
///
/// /// Accepts any UTF-8 body verbatim.
/// struct Text;
///
/// impl Decode<String> for Text {
///     fn decode(&self, body: &[u8]) -> Result<String> {
///         Ok(String::from_utf8_lossy(body).into_owned())
///     }
/// }
/// ```
pub trait Decode<T>: Send + Sync + 'static {
    fn decode(&self, body: &[u8]) -> Result<T>;
}

/// Decodes JSON bodies with `serde_json`.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl<T: DeserializeOwned> Decode<T> for JsonDecoder {
    fn decode(&self, body: &[u8]) -> Result<T> {
        Ok(serde_helpers::from_slice(body)?)
    }
}
