//! Response headers captured into every [`crate::ResponseEnvelope`].

use http::HeaderMap;
use http::header::ETAG;
use serde::Serialize;

/// Reference to the created or addressed resource
pub const CONTENT_REF: &str = "content-ref";
/// Link to the first page of a paged collection
pub const HREF_FIRST: &str = "href-first";
/// Link to the last page of a paged collection
pub const HREF_LAST: &str = "href-last";
/// Link to the next page of a paged collection
pub const HREF_NEXT: &str = "href-next";
/// Link to the previous page of a paged collection
pub const HREF_PREV: &str = "href-prev";

/// Well-known headers of a response; each holds the first non-empty value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WellKnownHeaders {
    pub etag: Option<String>,
    pub content_ref: Option<String>,
    pub first: Option<String>,
    pub last: Option<String>,
    pub next: Option<String>,
    pub prev: Option<String>,
}

impl WellKnownHeaders {
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            etag: first_value(headers, ETAG.as_str()),
            content_ref: first_value(headers, CONTENT_REF),
            first: first_value(headers, HREF_FIRST),
            last: first_value(headers, HREF_LAST),
            next: first_value(headers, HREF_NEXT),
            prev: first_value(headers, HREF_PREV),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn first_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_owned)
}
