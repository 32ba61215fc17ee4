use bon::Builder;
use tokio_tungstenite::tungstenite::client::IntoClientRequest as _;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use url::Url;

use super::error::WsError;
use super::frame;
use crate::Result;
use crate::types::Parameters;

/// Immutable description of one WebSocket session.
///
/// # Example
///
/// ```
/// use bgr_network::types::Parameters;
/// use bgr_network::ws::WebSocketSpec;
///
/// let spec = WebSocketSpec::builder()
///     .url("wss://chat.example.com/hub")
///     .handshake(Parameters::new().with("protocol", "json").with("version", 1))
///     .headers(vec![("Authorization".to_owned(), "Bearer token".to_owned())])
///     .build();
///
/// assert_eq!(spec.url(), "wss://chat.example.com/hub");
/// ```
#[derive(Debug, Clone, Builder)]
#[non_exhaustive]
pub struct WebSocketSpec {
    #[builder(into)]
    url: String,
    /// Sent as a JSON object in the first frame after the socket opens.
    #[builder(default, into)]
    handshake: Parameters,
    /// Extra headers for the upgrade request, appended in order.
    #[builder(default)]
    headers: Vec<(String, String)>,
}

impl WebSocketSpec {
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn handshake(&self) -> &Parameters {
        &self.handshake
    }

    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// The handshake payload as it goes on the wire, record separator included.
    pub(crate) fn handshake_frame(&self) -> Result<String> {
        let json = serde_json::to_string(&self.handshake).map_err(WsError::Serialization)?;

        Ok(frame(&json))
    }

    /// The HTTP upgrade request for this session.
    pub(crate) fn client_request(&self) -> Result<Request> {
        let url = Url::parse(&self.url).map_err(WsError::InvalidUrl)?;
        let mut request = url.as_str().into_client_request()?;

        for (name, value) in &self.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_e| WsError::InvalidHeader(name.clone()))?;
            let header_value =
                HeaderValue::from_str(value).map_err(|_e| WsError::InvalidHeader(name.clone()))?;
            request.headers_mut().append(header_name, header_value);
        }

        Ok(request)
    }
}
