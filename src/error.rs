use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;

/// HTTP status code type, re-exported for use with error inspection.
pub use reqwest::StatusCode;
use reqwest::header;
use url::Url;

use crate::types::Method;

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// The request could not be turned into a wire request, or the transport failed before a
    /// response was obtained
    Request,
    /// A response was obtained but its status was outside `200..300`, or its body could not be
    /// read
    Response,
    /// A successful response body could not be decoded into the declared type
    Decoding,
    /// Error related to WebSocket sessions
    WebSocket,
}

#[derive(Debug)]
pub struct Error {
    kind: Kind,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    backtrace: Backtrace,
}

impl Error {
    pub fn with_source<S: StdError + Send + Sync + 'static>(kind: Kind, source: S) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
            backtrace: Backtrace::capture(),
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    pub fn inner(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        let e = self.source.as_deref()?;
        e.downcast_ref::<E>()
    }

    pub fn request<S: Into<String>>(message: S) -> Self {
        Request {
            reason: message.into(),
        }
        .into()
    }

    pub fn status<S: Into<String>>(
        status_code: StatusCode,
        method: Method,
        url: Url,
        message: S,
    ) -> Self {
        Status {
            status_code,
            method,
            url,
            message: message.into(),
        }
        .into()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(src) => write!(f, "{:?}: {}", self.kind, src),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

/// A request that could not be built or sent.
#[non_exhaustive]
#[derive(Debug)]
pub struct Request {
    pub reason: String,
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid request: {}", self.reason)
    }
}

impl StdError for Request {}

#[non_exhaustive]
#[derive(Debug)]
pub struct Status {
    pub status_code: StatusCode,
    pub method: Method,
    pub url: Url,
    pub message: String,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "error({}) making {} call to {} with {}",
            self.status_code, self.method, self.url, self.message
        )
    }
}

impl StdError for Status {}

/// A response body that does not match the declared type.
#[non_exhaustive]
#[derive(Debug)]
pub struct Decoding {
    /// Name of the type the body was decoded into
    pub type_name: &'static str,
    /// JSON path at which decoding stopped, `.` for the document root
    pub path: String,
    pub source: serde_json::Error,
}

impl fmt::Display for Decoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unable to decode {} at `{}`: {}",
            self.type_name, self.path, self.source
        )
    }
}

impl StdError for Decoding {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.source)
    }
}

impl From<Request> for Error {
    fn from(err: Request) -> Self {
        Error::with_source(Kind::Request, err)
    }
}

impl From<Status> for Error {
    fn from(err: Status) -> Self {
        Error::with_source(Kind::Response, err)
    }
}

impl From<Decoding> for Error {
    fn from(err: Decoding) -> Self {
        Error::with_source(Kind::Decoding, err)
    }
}

/// Transport failures happen before any response exists.
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::with_source(Kind::Request, e)
    }
}

impl From<header::InvalidHeaderName> for Error {
    fn from(e: header::InvalidHeaderName) -> Self {
        Error::with_source(Kind::Request, e)
    }
}

impl From<header::InvalidHeaderValue> for Error {
    fn from(e: header::InvalidHeaderValue) -> Self {
        Error::with_source(Kind::Request, e)
    }
}
