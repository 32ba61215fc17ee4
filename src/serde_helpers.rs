//! Serde helpers for diagnosable deserialization.
//!
//! Decoding failures report the JSON path at which they occurred. When the `tracing` feature is
//! enabled, fields present in the payload but unknown to the target type are logged as
//! warnings, which helps detect API changes without failing the call.

use std::any::type_name;

use serde::de::DeserializeOwned;

use crate::error::Decoding;

/// Deserialize a JSON document, recording the failing path on error.
///
/// # Example
///
/// ```ignore
/// let err = from_slice::<Item>(br#"{"id":"one"}"#).unwrap_err();
/// assert_eq!(err.path, "id");
/// ```
pub(crate) fn from_slice<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, Decoding> {
    let mut track = serde_path_to_error::Track::new();
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);

    let result = {
        let tracked = serde_path_to_error::Deserializer::new(&mut deserializer, &mut track);
        deserialize_tracked::<T, _>(tracked)
    };

    let value = result.map_err(|source| Decoding {
        type_name: type_name::<T>(),
        path: track.path().to_string(),
        source,
    })?;

    // Trailing non-whitespace after the document is a decoding failure too
    deserializer.end().map_err(|source| Decoding {
        type_name: type_name::<T>(),
        path: ".".to_owned(),
        source,
    })?;

    Ok(value)
}

#[cfg(feature = "tracing")]
fn deserialize_tracked<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: DeserializeOwned,
    D: serde::Deserializer<'de>,
{
    let mut unknown_paths: Vec<String> = Vec::new();

    let value: T = serde_ignored::deserialize(deserializer, |path| {
        unknown_paths.push(path.to_string());
    })?;

    for path in unknown_paths {
        tracing::warn!(
            type_name = %type_name::<T>(),
            field = %path,
            "unknown field in response"
        );
    }

    Ok(value)
}

#[cfg(not(feature = "tracing"))]
fn deserialize_tracked<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: DeserializeOwned,
    D: serde::Deserializer<'de>,
{
    <T as serde::Deserialize>::deserialize(deserializer)
}
