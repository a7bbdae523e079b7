//! Wire shapes shared with downstream APIs.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Outcome code carried by API responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResponseCode {
    #[default]
    None = 0,
    Added = 1,
    Error = 2,
    Update = 3,
    Exists = 4,
    Rendered = 5,
    Initializing = 6,
    Success = 7,
    Failed = 8,
    Cancelled = 9,
}

impl ResponseCode {
    const ALL: [ResponseCode; 10] = [
        ResponseCode::None,
        ResponseCode::Added,
        ResponseCode::Error,
        ResponseCode::Update,
        ResponseCode::Exists,
        ResponseCode::Rendered,
        ResponseCode::Initializing,
        ResponseCode::Success,
        ResponseCode::Failed,
        ResponseCode::Cancelled,
    ];

    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn from_u8(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseCode::None => "None",
            ResponseCode::Added => "Added",
            ResponseCode::Error => "Error",
            ResponseCode::Update => "Update",
            ResponseCode::Exists => "Exists",
            ResponseCode::Rendered => "Rendered",
            ResponseCode::Initializing => "Initializing",
            ResponseCode::Success => "Success",
            ResponseCode::Failed => "Failed",
            ResponseCode::Cancelled => "Cancelled",
        }
    }

    /// Case-insensitive lookup by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|code| code.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ResponseCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for ResponseCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ResponseCodeVisitor)
    }
}

struct ResponseCodeVisitor;

impl Visitor<'_> for ResponseCodeVisitor {
    type Value = ResponseCode;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a response code number (0-9) or name")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<ResponseCode, E> {
        u8::try_from(v)
            .ok()
            .and_then(ResponseCode::from_u8)
            .ok_or_else(|| E::invalid_value(de::Unexpected::Unsigned(v), &self))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<ResponseCode, E> {
        u8::try_from(v)
            .ok()
            .and_then(ResponseCode::from_u8)
            .ok_or_else(|| E::invalid_value(de::Unexpected::Signed(v), &self))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<ResponseCode, E> {
        ResponseCode::from_name(v).ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
    }
}

/// Generic error body returned by downstream APIs on failure.
///
/// Keys are accepted in `camelCase`, `snake_case` or `PascalCase`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    #[serde(default, alias = "Title", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, alias = "Link", skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,

    #[serde(default, alias = "Message", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, alias = "Success", skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,

    #[serde(
        default,
        alias = "ResponseCode",
        alias = "response_code",
        skip_serializing_if = "Option::is_none"
    )]
    pub response_code: Option<ResponseCode>,
}

impl ErrorEnvelope {
    /// Parse a response body, ignoring anything that is not an error envelope.
    #[must_use]
    pub fn from_body(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }
}

/// `{ "item": T }` wrapper used by item-returning endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemEnvelope<T> {
    #[serde(alias = "Item")]
    pub item: T,
}
