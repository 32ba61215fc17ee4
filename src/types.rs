//! Shared request vocabulary: HTTP methods and ordered parameter maps.
//!
//! Parameter values are [`serde_json::Value`]s, so every value a caller can put in a
//! [`Parameters`] map is either a scalar (string, number, boolean, null) or a nested
//! array/object of the same. Serialization to a query string or a JSON body is therefore total.

use std::borrow::Cow;

use serde::ser::SerializeMap as _;
use serde::{Serialize, Serializer};
/// JSON value type used for parameters and handshake payloads.
pub use serde_json::{Map, Value, json};

/// HTTP request method.
///
/// [`Get`](Self::Get), [`Head`](Self::Head), [`Delete`](Self::Delete) and
/// [`Options`](Self::Options) carry parameters in the query string, the remaining methods carry
/// them as a JSON body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "UPPERCASE")]
#[non_exhaustive]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl Method {
    /// Whether parameters for this method are sent as a JSON request body.
    #[must_use]
    pub const fn is_body_bearing(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
            Method::Head => reqwest::Method::HEAD,
            Method::Options => reqwest::Method::OPTIONS,
        }
    }
}

/// Insertion-ordered mapping of parameter names to JSON values.
///
/// Inserting an existing key replaces its value in place, keeping the key's original position.
///
/// # Example
///
/// ```
/// use bgr_network::types::{Parameters, json};
///
/// let parameters = Parameters::new()
///     .with("q", "rust")
///     .with("page", 2)
///     .with("filters", json!({ "lang": "en" }));
///
/// assert_eq!(parameters.len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters(Vec<(String, Value)>);

impl Parameters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `value` under `key`, returning the previous value if the key was present.
    pub fn insert<K: Into<String>, V: Into<Value>>(&mut self, key: K, value: V) -> Option<Value> {
        let key = key.into();
        let value = value.into();

        if let Some((_, existing)) = self.0.iter_mut().find(|(k, _)| *k == key) {
            return Some(std::mem::replace(existing, value));
        }

        self.0.push((key, value));
        None
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.insert(key, value);
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Yields each parameter as a `(name, value)` pair of strings suitable for a query string.
    pub(crate) fn query_pairs(&self) -> impl Iterator<Item = (&str, Cow<'_, str>)> {
        self.iter().map(|(k, v)| (k, query_value(v)))
    }
}

/// Coerces a JSON value into the text placed in a query item.
///
/// Strings are used verbatim, `null` becomes an empty value, everything else is rendered as
/// compact JSON.
fn query_value(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s),
        Value::Null => Cow::Borrowed(""),
        other => Cow::Owned(other.to_string()),
    }
}

impl Serialize for Parameters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut parameters = Self::new();
        for (key, value) in iter {
            parameters.insert(key, value);
        }
        parameters
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> From<[(K, V); N]> for Parameters {
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

impl From<Map<String, Value>> for Parameters {
    fn from(map: Map<String, Value>) -> Self {
        map.into_iter().collect()
    }
}
