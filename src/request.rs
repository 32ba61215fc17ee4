//! Request descriptions and their transport-ready form.
//!
//! A [`RequestSpec`] describes a single HTTP call together with the type its response decodes
//! into. [`RequestSpec::to_wire`] materialises it into a [`WireRequest`]: parameters become
//! query items for query-bearing methods and a JSON object body for body-bearing ones, never
//! both.

#![allow(
    clippy::module_name_repetitions,
    reason = "Request prefix is intentional for clarity"
)]

use std::fmt;
use std::marker::PhantomData;

use bon::Builder;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::Result;
use crate::types::{Method, Parameters};

/// Immutable description of one HTTP call whose response decodes into `T`.
///
/// `T` is only used to pick the decoder at the call site; it is never serialized.
///
/// # Example
///
/// ```
/// use bgr_network::request::RequestSpec;
/// use bgr_network::types::{Method, Parameters};
///
/// #[derive(serde::Deserialize)]
/// struct Item {
///     id: u64,
///     name: String,
/// }
///
/// let spec = RequestSpec::<Vec<Item>>::builder()
///     .url("https://api.example.com/items")
///     .method(Method::Get)
///     .parameters(Parameters::new().with("q", "x"))
///     .headers(vec![("Accept".to_owned(), "application/json".to_owned())])
///     .build();
///
/// let wire = spec.to_wire().expect("valid url");
/// assert_eq!(wire.url.as_str(), "https://api.example.com/items?q=x");
/// assert!(wire.body.is_none());
/// ```
#[derive(Builder)]
pub struct RequestSpec<T> {
    /// Absolute URL of the endpoint, possibly already carrying query items.
    #[builder(into)]
    url: String,
    #[builder(default)]
    method: Method,
    #[builder(into)]
    parameters: Option<Parameters>,
    /// Header `(name, value)` pairs, sent in order and without de-duplication.
    #[builder(default)]
    headers: Vec<(String, String)>,
    #[builder(skip)]
    response: PhantomData<fn() -> T>,
}

impl<T> RequestSpec<T> {
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    #[must_use]
    pub fn parameters(&self) -> Option<&Parameters> {
        self.parameters.as_ref()
    }

    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Materialises this spec into a transport-ready request.
    ///
    /// Returns `None` if `url` is not a valid absolute URL. No headers are added beyond the
    /// ones supplied, in particular no `Content-Type` for JSON bodies.
    #[must_use]
    pub fn to_wire(&self) -> Option<WireRequest> {
        let mut url = Url::parse(&self.url).ok()?;
        let mut body = None;

        if let Some(parameters) = self.parameters.as_ref().filter(|p| !p.is_empty()) {
            if self.method.is_body_bearing() {
                body = Some(serde_json::to_vec(parameters).ok()?);
            } else {
                url.query_pairs_mut()
                    .extend_pairs(parameters.query_pairs());
            }
        }

        Some(WireRequest {
            url,
            method: self.method,
            headers: self.headers.clone(),
            body,
        })
    }
}

impl<T> Clone for RequestSpec<T> {
    fn clone(&self) -> Self {
        Self {
            url: self.url.clone(),
            method: self.method,
            parameters: self.parameters.clone(),
            headers: self.headers.clone(),
            response: PhantomData,
        }
    }
}

impl<T> fmt::Debug for RequestSpec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSpec")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("parameters", &self.parameters)
            .field("headers", &self.headers)
            .field("response", &std::any::type_name::<T>())
            .finish()
    }
}

/// Transport-ready form of a [`RequestSpec`].
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireRequest {
    /// Absolute URL including any query items derived from parameters
    pub url: Url,
    pub method: Method,
    pub headers: Vec<(String, String)>,
    /// JSON object body, present only for body-bearing methods with parameters
    pub body: Option<Vec<u8>>,
}

impl WireRequest {
    /// Converts into a [`reqwest::Request`], appending every header so duplicates survive.
    pub(crate) fn into_reqwest(self) -> Result<reqwest::Request> {
        let mut headers = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            headers.append(
                HeaderName::from_bytes(name.as_bytes())?,
                HeaderValue::from_str(value)?,
            );
        }

        let mut request = reqwest::Request::new(self.method.into(), self.url);
        *request.headers_mut() = headers;
        if let Some(body) = self.body {
            *request.body_mut() = Some(body.into());
        }

        Ok(request)
    }
}
