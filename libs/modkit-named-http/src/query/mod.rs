//! Query string encoding for structured parameters.
//!
//! Values are encoded recursively under a key prefix:
//! - scalars are written literally (floats with shortest round-trip precision)
//! - strings are form-URL-encoded
//! - date/times are written in ISO 8601 round-trip form
//! - arrays are comma-joined without any per-element key
//! - objects expand into `prefix.field=value` segments, recursing into nested objects
//! - null leaves are omitted entirely
//!
//! Field and map keys get their first character lower-cased before encoding,
//! so `Name` and `name` produce the same key.
//!
//! # Example
//!
//! ```ignore
//! use modkit_named_http::query::{QueryParams, encode_params};
//!
//! let params = QueryParams::new()
//!     .with("list", vec![1, 2, 3])
//!     .with("integer", 12244);
//! assert_eq!(encode_params(&params)?, "list=1,2,3&integer=12244");
//! ```

mod ser;
mod value;

use serde::Serialize;
use thiserror::Error;

pub use value::QueryValue;

/// Query encoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QueryError {
    /// Arrays are encoded without per-element keys, so composite elements
    /// cannot be represented.
    #[error("arrays of composite objects are not supported (element {index})")]
    CompositeArrayElement { index: usize },

    /// Map key did not serialize to a scalar
    #[error("query keys must be scalars, got {0}")]
    InvalidKey(&'static str),

    /// Error raised by a `Serialize` implementation
    #[error("{0}")]
    Custom(String),
}

impl serde::ser::Error for QueryError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        QueryError::Custom(msg.to_string())
    }
}

/// Ordered set of top-level query parameters.
///
/// Entries are emitted in insertion order. Inserting an existing key replaces
/// its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    entries: Vec<(String, QueryValue)>,
}

impl QueryParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a parameter.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<QueryValue>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Insert any serializable value (struct, map, sequence, scalar).
    ///
    /// # Errors
    /// Returns an error if the value's `Serialize` implementation fails or
    /// produces a map with non-scalar keys.
    pub fn insert_serialized<T>(&mut self, key: impl Into<String>, value: &T) -> Result<(), QueryError>
    where
        T: Serialize + ?Sized,
    {
        let value = to_query_value(value)?;
        self.insert(key, value);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.entries
            .iter()
            .find_map(|(k, v)| (k == key).then_some(v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueryValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Encode all parameters, see [`encode_params`].
    ///
    /// # Errors
    /// Returns an error if a parameter contains an unsupported array.
    pub fn to_query_string(&self) -> Result<String, QueryError> {
        encode_params(self)
    }
}

impl<K, V> FromIterator<(K, V)> for QueryParams
where
    K: Into<String>,
    V: Into<QueryValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = QueryParams::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

impl From<QueryParams> for QueryValue {
    fn from(params: QueryParams) -> Self {
        QueryValue::Object(params.entries)
    }
}

/// Convert any serializable value into a [`QueryValue`].
///
/// Struct fields keep their declaration order. `chrono` date/times inside
/// serialized structs arrive as plain strings; build a [`QueryValue`] from the
/// date/time directly to get the unescaped ISO form.
///
/// # Errors
/// Returns an error if the value's `Serialize` implementation fails or
/// produces a map with non-scalar keys.
pub fn to_query_value<T>(value: &T) -> Result<QueryValue, QueryError>
where
    T: Serialize + ?Sized,
{
    value.serialize(ser::ValueSerializer)
}

/// Serialize and encode a value without key prefix, see [`encode_value`].
///
/// # Errors
/// Same as [`to_query_value`] and [`encode_value`].
pub fn to_query_string<T>(value: &T) -> Result<String, QueryError>
where
    T: Serialize + ?Sized,
{
    encode_value(&to_query_value(value)?)
}

/// Encode top-level parameters as `key=value` segments joined with `&`.
///
/// # Errors
/// Returns [`QueryError::CompositeArrayElement`] for arrays holding objects.
pub fn encode_params(params: &QueryParams) -> Result<String, QueryError> {
    let mut segments = Vec::with_capacity(params.len());
    for (key, value) in params.iter() {
        encode_prefixed(value, &encode_key(key), &mut segments)?;
    }
    Ok(segments.join("&"))
}

/// Encode a value that has no key of its own.
///
/// Scalars and arrays yield just their encoded text (`1`, `a`, `1,2,3`);
/// objects yield `field=value` segments keyed by their field names.
///
/// # Errors
/// Returns [`QueryError::CompositeArrayElement`] for arrays holding objects.
pub fn encode_value(value: &QueryValue) -> Result<String, QueryError> {
    match value {
        QueryValue::Object(fields) => {
            let mut segments = Vec::with_capacity(fields.len());
            for (name, field) in fields {
                encode_prefixed(field, &encode_key(name), &mut segments)?;
            }
            Ok(segments.join("&"))
        }
        leaf => encode_leaf(leaf),
    }
}

fn encode_prefixed(
    value: &QueryValue,
    prefix: &str,
    segments: &mut Vec<String>,
) -> Result<(), QueryError> {
    match value {
        QueryValue::Null => {}
        QueryValue::Object(fields) => {
            for (name, field) in fields {
                let nested = format!("{prefix}.{}", encode_key(name));
                encode_prefixed(field, &nested, segments)?;
            }
        }
        leaf => segments.push(format!("{prefix}={}", encode_leaf(leaf)?)),
    }
    Ok(())
}

fn encode_leaf(value: &QueryValue) -> Result<String, QueryError> {
    let encoded = match value {
        QueryValue::Null => String::new(),
        QueryValue::Bool(v) => v.to_string(),
        QueryValue::Int(v) => v.to_string(),
        QueryValue::UInt(v) => v.to_string(),
        QueryValue::Char(v) => url_encode(v.encode_utf8(&mut [0; 4])),
        QueryValue::Float(v) => format_float(f64::from(*v), v.to_string()),
        QueryValue::Double(v) => format_float(*v, v.to_string()),
        // '+' would decode as a space and lose the offset
        QueryValue::DateTime(v) => v.replace('+', "%2B"),
        QueryValue::Str(v) => url_encode(v),
        QueryValue::Array(items) => {
            let mut parts = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                if matches!(item, QueryValue::Object(_)) {
                    return Err(QueryError::CompositeArrayElement { index });
                }
                parts.push(encode_leaf(item)?);
            }
            parts.join(",")
        }
        QueryValue::Object(_) => encode_value(value)?,
    };
    Ok(encoded)
}

/// `display` is the shortest round-trip text of the original float width.
fn format_float(value: f64, display: String) -> String {
    if value.is_nan() {
        "NaN".to_owned()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "Infinity".to_owned()
        } else {
            "-Infinity".to_owned()
        }
    } else {
        display
    }
}

fn encode_key(name: &str) -> String {
    url_encode(&initial_lower_case(name))
}

fn url_encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Lower-case the first character only; blank names are returned untouched.
fn initial_lower_case(source: &str) -> String {
    if source.trim().is_empty() {
        return source.to_owned();
    }
    let mut chars = source.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
