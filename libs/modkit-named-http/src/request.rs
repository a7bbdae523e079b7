use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE, HeaderName, HeaderValue};
use http::{Method, Request, Uri};
use http_body_util::Full;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, warn};

use crate::client::NamedClient;
use crate::envelope::ResponseCode;
use crate::error::ClientError;
use crate::query::QueryParams;
use crate::response::{self, ResponseEnvelope};
use crate::transport::RawResponse;

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Request on a [`NamedClient`], sent by one of the terminal methods.
///
/// Created by [`NamedClient::get`], [`NamedClient::post`],
/// [`NamedClient::put`] and [`NamedClient::delete`].
///
/// Terminal methods:
/// - [`json`](NamedRequest::json) / [`json_envelope`](NamedRequest::json_envelope)
/// - [`text`](NamedRequest::text) / [`text_envelope`](NamedRequest::text_envelope)
/// - [`response_code`](NamedRequest::response_code)
///
/// Builder errors (body serialization, invalid headers) are reported by the
/// terminal method.
///
/// # Example
///
/// ```ignore
/// let products: Vec<Product> = client
///     .get("products")
///     .query(QueryParams::new().with("page", 2))
///     .cancellation(token)
///     .json()
///     .await?;
/// ```
#[must_use = "NamedRequest does nothing until a terminal method is awaited"]
pub struct NamedRequest<'a> {
    client: &'a NamedClient,
    method: Method,
    path: String,
    query: Option<QueryParams>,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Option<Bytes>,
    cancellation: CancellationToken,
    /// Error captured during building (deferred to the terminal call)
    error: Option<ClientError>,
}

impl<'a> NamedRequest<'a> {
    pub(crate) fn new(client: &'a NamedClient, method: Method, path: &str) -> Self {
        Self {
            client,
            method,
            path: path.to_owned(),
            query: None,
            headers: Vec::new(),
            body: None,
            cancellation: CancellationToken::new(),
            error: None,
        }
    }

    pub(crate) fn json_body<B>(mut self, body: &B) -> Self
    where
        B: Serialize + ?Sized,
    {
        if self.error.is_some() {
            return self;
        }
        match serde_json::to_vec(body) {
            Ok(bytes) => self.body = Some(Bytes::from(bytes)),
            Err(e) => self.error = Some(ClientError::Json(e)),
        }
        self
    }

    /// Query parameters appended to the URL. Empty parameters add nothing.
    pub fn query(mut self, params: QueryParams) -> Self {
        self.query = Some(params);
        self
    }

    /// Caller cancellation; the request fails with [`ClientError::Cancelled`]
    /// as soon as the token fires, or immediately if it already has.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Add a header to this request only.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.error.is_some() {
            return self;
        }
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => self.headers.push((name, value)),
            (Err(e), _) => {
                self.error = Some(ClientError::RequestBuild(http::Error::from(e)));
            }
            (_, Err(e)) => self.error = Some(ClientError::InvalidHeaderValue(e)),
        }
        self
    }

    /// Decode a JSON body.
    ///
    /// # Errors
    /// Returns [`ClientError::Unauthorized`] on 401, and
    /// [`ClientError::UnexpectedStatus`] on other non-2xx responses when `T`
    /// cannot be built from an empty object. Transport, cancellation and
    /// decoding failures are returned as their own variants.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, ClientError> {
        let (raw, url) = self.send().await?;
        response::decode_json(&raw, &url)?.require_value(&url)
    }

    /// Decode a JSON body together with status and well-known headers.
    ///
    /// # Errors
    /// Returns [`ClientError::Unauthorized`] on 401; other non-2xx responses
    /// produce an envelope (see [`ResponseEnvelope`]).
    pub async fn json_envelope<T: DeserializeOwned>(
        self,
    ) -> Result<ResponseEnvelope<T>, ClientError> {
        let (raw, url) = self.send().await?;
        response::decode_json(&raw, &url)
    }

    /// Return the raw body as text; non-2xx bodies are returned as well.
    ///
    /// # Errors
    /// Returns [`ClientError::Unauthorized`] on 401.
    pub async fn text(self) -> Result<String, ClientError> {
        let (raw, url) = self.send().await?;
        response::decode_text(&raw, &url)?.require_value(&url)
    }

    /// Raw body as text together with status and well-known headers.
    ///
    /// # Errors
    /// Returns [`ClientError::Unauthorized`] on 401.
    pub async fn text_envelope(self) -> Result<ResponseEnvelope<String>, ClientError> {
        let (raw, url) = self.send().await?;
        response::decode_text(&raw, &url)
    }

    /// [`ResponseCode::Success`] on 2xx, [`ResponseCode::Failed`] otherwise.
    /// The body is not decoded.
    ///
    /// # Errors
    /// Returns [`ClientError::Unauthorized`] on 401.
    pub async fn response_code(self) -> Result<ResponseCode, ClientError> {
        let (raw, url) = self.send().await?;
        response::decode_code(&raw, &url)
    }

    async fn send(mut self) -> Result<(RawResponse, String), ClientError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        if self.cancellation.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        let client = self.client;
        let span = tracing::info_span!(
            "named_http.request",
            client = %client.name(),
            method = %self.method,
        );

        async move {
            let authorization = client.authorization().header_for_request().await?;
            let url = client.resolve_url(&self.path, self.query.as_ref())?;
            let uri = validate_url(&url)?;

            let mut builder = Request::builder().method(self.method).uri(uri);
            if let Some(value) = authorization {
                builder = builder.header(AUTHORIZATION, value);
            }
            let has_content_type = self.headers.iter().any(|(name, _)| name == CONTENT_TYPE);
            if self.body.is_some() && !has_content_type {
                builder = builder.header(CONTENT_TYPE, JSON_CONTENT_TYPE);
            }
            for (name, value) in self.headers {
                builder = builder.header(name, value);
            }
            let request = builder.body(Full::new(self.body.unwrap_or_default()))?;

            info!(url = %url, "sending request");
            let abort = client.abort_token();
            let raw = client
                .transport()
                .execute(request, &self.cancellation, &abort)
                .await?;

            if raw.status.is_success() {
                info!(status = raw.status.as_u16(), "request completed");
            } else {
                warn!(status = raw.status.as_u16(), url = %url, "request failed");
            }
            Ok((raw, url))
        }
        .instrument(span)
        .await
    }
}

fn validate_url(url: &str) -> Result<Uri, ClientError> {
    Uri::try_from(url).map_err(|e| ClientError::InvalidUri {
        url: url.to_owned(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::config::NamedClientConfig;

    fn client() -> NamedClient {
        NamedClient::new("test", "http://127.0.0.1:1/api", &NamedClientConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn pre_cancelled_request_fails_without_network() {
        let client = client();
        let token = CancellationToken::new();
        token.cancel();

        let err = client.get("items").cancellation(token).text().await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn body_serialization_error_is_deferred() {
        use std::collections::HashMap;

        let client = client();
        let mut body = HashMap::new();
        body.insert(vec![1_u8], 1_u8);

        let err = client.post("items", &body).text().await.unwrap_err();
        assert!(matches!(err, ClientError::Json(_)));
    }

    #[tokio::test]
    async fn invalid_header_is_deferred() {
        let client = client();
        let err = client
            .get("items")
            .header("x-trace", "bad\nvalue")
            .text()
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidHeaderValue(_)));

        let err = client
            .get("items")
            .header("bad header", "v")
            .text()
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::RequestBuild(_)));
    }

    #[tokio::test]
    async fn invalid_path_is_rejected_before_sending() {
        let client = client();
        let err = client.get("a b").text().await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidUri { .. }));
    }

    #[test]
    fn validate_url_accepts_absolute_urls() {
        let uri = validate_url("http://api.test/items/?page=2").unwrap();
        assert_eq!(uri.path(), "/items/");
        assert_eq!(uri.query(), Some("page=2"));
    }
}
