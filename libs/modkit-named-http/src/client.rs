use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use http::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::auth::AuthorizationState;
use crate::config::NamedClientConfig;
use crate::envelope::ItemEnvelope;
use crate::error::ClientError;
use crate::query::{QueryParams, encode_params};
use crate::request::NamedRequest;
use crate::response::ResponseEnvelope;
use crate::transport::HttpTransport;

/// HTTP client bound to a base URL, with its own transport and credentials.
///
/// Usually obtained from [`crate::ClientRegistry`], which scopes clients to the
/// calling principal. Paths passed to the verb methods are resolved against
/// the base URL:
///
/// - a leading `/` is dropped
/// - a trailing `/` is added unless the path carries a query (`?`)
/// - an empty path targets the base URL itself
///
/// # Example
///
/// ```ignore
/// let client = registry.create(&ctx, "catalog", "https://api.example.com/v1")?;
/// client.authorization().set_bearer_token(token);
///
/// let product: Product = client.get("products/70").json().await?;
/// ```
pub struct NamedClient {
    name: Arc<str>,
    base_url: ArcSwap<String>,
    transport: Arc<HttpTransport>,
    authorization: AuthorizationState,
    abort: ArcSwap<CancellationToken>,
}

impl fmt::Debug for NamedClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedClient")
            .field("name", &self.name)
            .field("base_url", &self.base_url.load().as_str())
            .field("transport", &self.transport)
            .field("authorization", &self.authorization)
            .finish_non_exhaustive()
    }
}

impl NamedClient {
    /// Create a client with a dedicated transport.
    ///
    /// # Errors
    /// Returns [`ClientError::InvalidUri`] if `base_url` is not an absolute
    /// `http`/`https` URL, or a transport construction error.
    pub fn new(
        name: &str,
        base_url: &str,
        config: &NamedClientConfig,
    ) -> Result<Self, ClientError> {
        let base_url = normalize_base_url(base_url)?;
        let transport = Arc::new(HttpTransport::new(config)?);
        Ok(Self::from_parts(name, base_url, transport))
    }

    /// Create a client on top of an existing transport.
    ///
    /// # Errors
    /// Returns [`ClientError::InvalidUri`] if `base_url` is not an absolute
    /// `http`/`https` URL.
    pub fn with_transport(
        name: &str,
        base_url: &str,
        transport: Arc<HttpTransport>,
    ) -> Result<Self, ClientError> {
        let base_url = normalize_base_url(base_url)?;
        Ok(Self::from_parts(name, base_url, transport))
    }

    fn from_parts(name: &str, base_url: String, transport: Arc<HttpTransport>) -> Self {
        Self {
            name: Arc::from(name),
            base_url: ArcSwap::from_pointee(base_url),
            transport,
            authorization: AuthorizationState::new(),
            abort: ArcSwap::from_pointee(CancellationToken::new()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current base URL, always ending in `/`.
    #[must_use]
    pub fn base_url(&self) -> Arc<String> {
        self.base_url.load_full()
    }

    /// Point the client at a new base URL and abort its in-flight requests.
    ///
    /// # Errors
    /// Returns [`ClientError::InvalidUri`] if `base_url` is not an absolute
    /// `http`/`https` URL; the previous base URL stays in place.
    pub fn set_base_url(&self, base_url: &str) -> Result<(), ClientError> {
        let base_url = normalize_base_url(base_url)?;
        info!(client = %self.name, base_url = %base_url, "base URL updated");
        self.base_url.store(Arc::new(base_url));
        self.abort();
        Ok(())
    }

    /// Cancel every request currently in flight on this client.
    ///
    /// Requests started afterwards are not affected.
    pub fn abort(&self) {
        let previous = self.abort.swap(Arc::new(CancellationToken::new()));
        previous.cancel();
        debug!(client = %self.name, "pending requests aborted");
    }

    #[must_use]
    pub fn authorization(&self) -> &AuthorizationState {
        &self.authorization
    }

    /// Transport shared by all requests of this client.
    #[must_use]
    pub fn transport(&self) -> &Arc<HttpTransport> {
        &self.transport
    }

    pub fn get(&self, path: &str) -> NamedRequest<'_> {
        NamedRequest::new(self, Method::GET, path)
    }

    pub fn post<B>(&self, path: &str, body: &B) -> NamedRequest<'_>
    where
        B: Serialize + ?Sized,
    {
        NamedRequest::new(self, Method::POST, path).json_body(body)
    }

    pub fn put<B>(&self, path: &str, body: &B) -> NamedRequest<'_>
    where
        B: Serialize + ?Sized,
    {
        NamedRequest::new(self, Method::PUT, path).json_body(body)
    }

    pub fn delete(&self, path: &str) -> NamedRequest<'_> {
        NamedRequest::new(self, Method::DELETE, path)
    }

    /// POST `body` and unwrap the `{ "item": T }` response.
    ///
    /// # Errors
    /// Same as [`NamedRequest::json_envelope`].
    pub async fn post_item<B, T>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ResponseEnvelope<T>, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let envelope = self
            .post(path, body)
            .json_envelope::<ItemEnvelope<T>>()
            .await?;
        Ok(envelope.map(|wrapped| wrapped.item))
    }

    pub(crate) fn abort_token(&self) -> Arc<CancellationToken> {
        self.abort.load_full()
    }

    pub(crate) fn resolve_url(
        &self,
        path: &str,
        query: Option<&QueryParams>,
    ) -> Result<String, ClientError> {
        let mut url = self.base_url.load().as_str().to_owned();

        let path = path.trim_start_matches('/');
        if !path.is_empty() {
            url.push_str(path);
            if !path.contains('?') && !path.ends_with('/') {
                url.push('/');
            }
        }

        if let Some(params) = query.filter(|p| !p.is_empty()) {
            let encoded = encode_params(params)?;
            if !encoded.is_empty() {
                url.push(if url.contains('?') { '&' } else { '?' });
                url.push_str(&encoded);
            }
        }
        Ok(url)
    }
}

/// Validate a base URL and make sure it ends with `/`.
pub fn normalize_base_url(base_url: &str) -> Result<String, ClientError> {
    let invalid = |reason: &str| ClientError::InvalidUri {
        url: base_url.to_owned(),
        reason: reason.to_owned(),
    };

    let trimmed = base_url.trim();
    let parsed = url::Url::parse(trimmed).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if parsed.host_str().is_none() {
        return Err(invalid("host is missing"));
    }
    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(invalid("base URL must not carry a query or fragment"));
    }

    let mut normalized = trimmed.to_owned();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Ok(normalized)
}
