use http::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::binding;
use crate::envelope::{ErrorEnvelope, ResponseCode};
use crate::error::ClientError;
use crate::headers::WellKnownHeaders;
use crate::transport::RawResponse;

/// Decoded response with its status and well-known headers.
///
/// On a 2xx response `value` holds the decoded body. On any other status
/// (except 401, which is always an error) it holds the best-effort default of
/// `T` with the error body's fields merged in, or `None` if `T` has no default
/// form.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope<T> {
    pub value: Option<T>,
    pub status: StatusCode,
    pub headers: WellKnownHeaders,
}

impl<T> ResponseEnvelope<T> {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    #[must_use]
    pub fn into_value(self) -> Option<T> {
        self.value
    }

    #[must_use]
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ResponseEnvelope<U> {
        ResponseEnvelope {
            value: self.value.map(f),
            status: self.status,
            headers: self.headers,
        }
    }

    /// Take the value, failing if none could be produced.
    ///
    /// # Errors
    /// Returns [`ClientError::UnexpectedStatus`] if `value` is `None`.
    pub fn require_value(self, url: &str) -> Result<T, ClientError> {
        let status = self.status;
        self.value.ok_or_else(|| ClientError::UnexpectedStatus {
            status,
            url: url.to_owned(),
        })
    }
}

pub fn decode_json<T>(raw: &RawResponse, url: &str) -> Result<ResponseEnvelope<T>, ClientError>
where
    T: DeserializeOwned,
{
    let headers = WellKnownHeaders::from_headers(&raw.headers);

    let value = if raw.status.is_success() {
        Some(decode_success_body(&raw.body)?)
    } else {
        reject_unauthorized(raw.status, url)?;
        let error = ErrorEnvelope::from_body(&raw.body);
        binding::default_with::<T, ErrorEnvelope>(error.as_ref())
    };

    Ok(ResponseEnvelope {
        value,
        status: raw.status,
        headers,
    })
}

pub fn decode_text(raw: &RawResponse, url: &str) -> Result<ResponseEnvelope<String>, ClientError> {
    if !raw.status.is_success() {
        reject_unauthorized(raw.status, url)?;
    }
    Ok(ResponseEnvelope {
        value: Some(String::from_utf8_lossy(&raw.body).into_owned()),
        status: raw.status,
        headers: WellKnownHeaders::from_headers(&raw.headers),
    })
}

pub fn decode_code(raw: &RawResponse, url: &str) -> Result<ResponseCode, ClientError> {
    if raw.status.is_success() {
        return Ok(ResponseCode::Success);
    }
    reject_unauthorized(raw.status, url)?;
    Ok(ResponseCode::Failed)
}

/// Empty success bodies (e.g. 204) decode as `null`, then as `{}`.
fn decode_success_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ClientError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        if let Ok(value) = serde_json::from_value(Value::Null) {
            return Ok(value);
        }
        if let Some(value) = binding::default_with::<T, ErrorEnvelope>(None) {
            return Ok(value);
        }
    }
    Ok(serde_json::from_slice(body)?)
}

fn reject_unauthorized(status: StatusCode, url: &str) -> Result<(), ClientError> {
    if status == StatusCode::UNAUTHORIZED {
        return Err(ClientError::Unauthorized {
            url: url.to_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{HeaderMap, HeaderValue};
    use serde::Deserialize;

    const URL: &str = "http://api.test/products/70/";

    #[derive(Debug, Default, PartialEq, Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    struct Product {
        id: u32,
        name: String,
        message: Option<String>,
        response_code: ResponseCode,
    }

    #[derive(Debug, PartialEq, Deserialize)]
    struct Strict {
        id: u32,
    }

    fn raw(status: u16, body: &str) -> RawResponse {
        RawResponse {
            status: StatusCode::from_u16(status).unwrap(),
            headers: HeaderMap::new(),
            body: Bytes::copy_from_slice(body.as_bytes()),
        }
    }

    #[test]
    fn success_body_is_decoded() {
        let envelope: ResponseEnvelope<Product> =
            decode_json(&raw(200, r#"{"id":70,"name":"chair"}"#), URL).unwrap();
        assert!(envelope.is_success());
        let product = envelope.value.unwrap();
        assert_eq!(product.id, 70);
        assert_eq!(product.name, "chair");
    }

    #[test]
    fn malformed_success_body_is_json_error() {
        let err = decode_json::<Product>(&raw(200, "not json"), URL).unwrap_err();
        assert!(matches!(err, ClientError::Json(_)));
    }

    #[test]
    fn empty_success_body_uses_default() {
        let envelope = decode_json::<Option<Product>>(&raw(204, ""), URL).unwrap();
        assert_eq!(envelope.value, Some(None));

        let envelope = decode_json::<Product>(&raw(200, ""), URL).unwrap();
        assert_eq!(envelope.value, Some(Product::default()));
    }

    #[test]
    fn unauthorized_is_terminal() {
        let err = decode_json::<Product>(&raw(401, ""), URL).unwrap_err();
        assert!(err.is_unauthorized());
        assert!(decode_text(&raw(401, "denied"), URL).unwrap_err().is_unauthorized());
        assert!(decode_code(&raw(401, ""), URL).unwrap_err().is_unauthorized());
    }

    #[test]
    fn failure_merges_error_envelope_into_default() {
        let envelope: ResponseEnvelope<Product> = decode_json(
            &raw(404, r#"{"title":"Missing","message":"no product 70","responseCode":8}"#),
            URL,
        )
        .unwrap();

        assert_eq!(envelope.status, StatusCode::NOT_FOUND);
        assert_eq!(
            envelope.value,
            Some(Product {
                message: Some("no product 70".to_owned()),
                response_code: ResponseCode::Failed,
                ..Product::default()
            })
        );
    }

    #[test]
    fn failure_decodes_into_error_envelope() {
        let envelope: ResponseEnvelope<ErrorEnvelope> = decode_json(
            &raw(404, r#"{"title":"Missing","message":"no product 70"}"#),
            URL,
        )
        .unwrap();

        let error = envelope.value.unwrap();
        assert_eq!(error.title.as_deref(), Some("Missing"));
        assert_eq!(error.message.as_deref(), Some("no product 70"));
        assert!(error.response_code.is_none());
    }

    #[test]
    fn failure_fills_aliased_target() {
        #[derive(Debug, Default, Deserialize)]
        #[serde(default)]
        struct Aliased {
            #[serde(alias = "Message")]
            message: Option<String>,
        }

        let envelope: ResponseEnvelope<Aliased> =
            decode_json(&raw(500, r#"{"message":"boom"}"#), URL).unwrap();
        assert_eq!(envelope.value.unwrap().message.as_deref(), Some("boom"));
    }

    #[test]
    fn failure_with_non_json_body_yields_default() {
        let envelope: ResponseEnvelope<Product> =
            decode_json(&raw(500, "<html>boom</html>"), URL).unwrap();
        assert_eq!(envelope.value, Some(Product::default()));
    }

    #[test]
    fn failure_without_default_form_yields_none() {
        let envelope: ResponseEnvelope<Strict> =
            decode_json(&raw(500, r#"{"message":"boom"}"#), URL).unwrap();
        assert!(envelope.value.is_none());

        let err = envelope.require_value(URL).unwrap_err();
        assert!(matches!(
            err,
            ClientError::UnexpectedStatus { status, .. } if status == StatusCode::INTERNAL_SERVER_ERROR
        ));
    }

    #[test]
    fn text_failure_keeps_raw_body() {
        let envelope = decode_text(&raw(400, "bad input"), URL).unwrap();
        assert_eq!(envelope.status, StatusCode::BAD_REQUEST);
        assert_eq!(envelope.value.as_deref(), Some("bad input"));
    }

    #[test]
    fn delete_codes() {
        assert_eq!(decode_code(&raw(204, ""), URL).unwrap(), ResponseCode::Success);
        assert_eq!(decode_code(&raw(404, ""), URL).unwrap(), ResponseCode::Failed);
        assert_eq!(decode_code(&raw(500, "x"), URL).unwrap(), ResponseCode::Failed);
    }

    #[test]
    fn headers_are_captured_on_any_status() {
        let mut response = raw(409, "{}");
        response
            .headers
            .insert(http::header::ETAG, HeaderValue::from_static("\"v2\""));
        let envelope = decode_json::<Product>(&response, URL).unwrap();
        assert_eq!(envelope.headers.etag.as_deref(), Some("\"v2\""));
    }

    #[test]
    fn map_preserves_status_and_headers() {
        let envelope = decode_text(&raw(200, "42"), URL).unwrap();
        let mapped = envelope.map(|s| s.len());
        assert_eq!(mapped.value, Some(2));
        assert_eq!(mapped.status, StatusCode::OK);
    }
}
