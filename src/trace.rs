//! Human-readable diagnostic block for a received response.

use std::fmt;

use reqwest::StatusCode;
use url::Url;

/// Snapshot of a response, rendered as a `REQUEST INFO` block.
///
/// The client emits this through `tracing` at debug level; it never influences the outcome of
/// a call.
#[non_exhaustive]
#[derive(Debug, Clone, Copy)]
pub struct ResponseTrace<'a> {
    pub status_code: StatusCode,
    pub url: &'a Url,
    /// Essence of the `Content-Type` header, e.g. `application/json`
    pub mime_type: Option<&'a str>,
    pub body: &'a [u8],
}

impl<'a> ResponseTrace<'a> {
    #[must_use]
    pub fn new(
        status_code: StatusCode,
        url: &'a Url,
        mime_type: Option<&'a str>,
        body: &'a [u8],
    ) -> Self {
        Self {
            status_code,
            url,
            mime_type,
            body,
        }
    }
}

impl fmt::Display for ResponseTrace<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "*** REQUEST INFO ***")?;
        writeln!(f, "********************")?;
        writeln!(f, "* Status Code: {}", self.status_code.as_u16())?;
        writeln!(f, "* URL: {}", self.url)?;
        writeln!(f, "* Mime Type: {}", self.mime_type.unwrap_or("-"))?;
        writeln!(f, "* Response Data ↓")?;
        writeln!(f, "________________⌋")?;
        writeln!(f, " {}", String::from_utf8_lossy(self.body))?;
        write!(f, "------------------")
    }
}

/// Strips parameters from a `Content-Type` value, `text/html; charset=utf-8` → `text/html`.
pub(crate) fn mime_essence(content_type: &str) -> &str {
    content_type
        .split(';')
        .next()
        .map_or(content_type, str::trim)
}
