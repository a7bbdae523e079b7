//! HTTP transport shared by all requests of one named client.
//!
//! A hyper connection pool wrapped in a small tower stack:
//!
//! ```text
//! ErrorMapping → Timeout → UserAgent → hyper client (http + https)
//! ```
//!
//! Transport failures are never retried; they surface as [`ClientError`].

use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use tokio_util::sync::CancellationToken;
use tower::timeout::TimeoutLayer;
use tower::util::BoxCloneSyncService;
use tower::{Layer, Service, ServiceBuilder, ServiceExt};

use crate::config::NamedClientConfig;
use crate::error::ClientError;

type TransportService = BoxCloneSyncService<Request<Full<Bytes>>, Response<Incoming>, ClientError>;

/// Fully read response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Connection pool plus middleware stack owned by a named client.
///
/// Shared by reference; two handles compare equal with `Arc::ptr_eq` only if
/// they were created together.
pub struct HttpTransport {
    service: TransportService,
    request_timeout: Duration,
    max_body_size: usize,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("request_timeout", &self.request_timeout)
            .field("max_body_size", &self.max_body_size)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Build a transport with its own connection pool.
    ///
    /// # Errors
    /// Returns [`ClientError::Tls`] if the TLS connector cannot be initialized,
    /// or [`ClientError::InvalidHeaderValue`] for an invalid user agent.
    pub fn new(config: &NamedClientConfig) -> Result<Self, ClientError> {
        let timeout = config.request_timeout;
        let https = build_https_connector()?;

        let hyper_client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .build::<_, Full<Bytes>>(https);

        let ua_layer = UserAgentLayer::try_new(&config.user_agent)?;

        let service = ServiceBuilder::new()
            .layer(TimeoutLayer::new(timeout))
            .layer(ua_layer)
            .service(hyper_client)
            .map_err(move |e: tower::BoxError| map_tower_error(e, timeout));

        Ok(Self {
            service: BoxCloneSyncService::new(service),
            request_timeout: timeout,
            max_body_size: config.max_body_size,
        })
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    #[must_use]
    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }

    /// Send the request and read the whole body.
    ///
    /// Resolves to [`ClientError::Cancelled`] as soon as either token fires.
    pub(crate) async fn execute(
        &self,
        request: Request<Full<Bytes>>,
        cancellation: &CancellationToken,
        abort: &CancellationToken,
    ) -> Result<RawResponse, ClientError> {
        let exchange = async {
            let response = self.service.clone().oneshot(request).await?;
            let (parts, body) = response.into_parts();
            let body = tokio::time::timeout(
                self.request_timeout,
                read_body_limited(body, self.max_body_size),
            )
            .await
            .map_err(|_| ClientError::Timeout(self.request_timeout))??;

            Ok::<_, ClientError>(RawResponse {
                status: parts.status,
                headers: parts.headers,
                body,
            })
        };

        tokio::select! {
            biased;
            () = cancellation.cancelled() => Err(ClientError::Cancelled),
            () = abort.cancelled() => Err(ClientError::Cancelled),
            result = exchange => result,
        }
    }
}

async fn read_body_limited(body: Incoming, limit: usize) -> Result<Bytes, ClientError> {
    let mut collected = Vec::new();
    let mut body = std::pin::pin!(body);

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|e| ClientError::Transport(Box::new(e)))?;
        if let Some(chunk) = frame.data_ref() {
            if collected.len() + chunk.len() > limit {
                return Err(ClientError::BodyTooLarge { limit });
            }
            collected.extend_from_slice(chunk);
        }
    }

    Ok(Bytes::from(collected))
}

fn map_tower_error(err: tower::BoxError, timeout: Duration) -> ClientError {
    if err.is::<tower::timeout::error::Elapsed>() {
        return ClientError::Timeout(timeout);
    }
    match err.downcast::<hyper_util::client::legacy::Error>() {
        Ok(hyper_err) => ClientError::from(*hyper_err),
        Err(other) => ClientError::Transport(other),
    }
}

/// Use the globally installed crypto provider if there is one, aws-lc-rs otherwise.
fn crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

fn build_https_connector() -> Result<HttpsConnector<HttpConnector>, ClientError> {
    let connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_provider_and_webpki_roots(crypto_provider())
        .map_err(|e| ClientError::Tls(Box::new(e)))?
        .https_or_http()
        .enable_http1()
        .build();
    Ok(connector)
}

/// Tower layer that adds a `User-Agent` header unless the request has one.
#[derive(Clone)]
struct UserAgentLayer {
    user_agent: HeaderValue,
}

impl UserAgentLayer {
    fn try_new(user_agent: &str) -> Result<Self, ClientError> {
        Ok(Self {
            user_agent: HeaderValue::from_str(user_agent)?,
        })
    }
}

impl<S> Layer<S> for UserAgentLayer {
    type Service = UserAgentService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        UserAgentService {
            inner,
            user_agent: self.user_agent.clone(),
        }
    }
}

#[derive(Clone)]
struct UserAgentService<S> {
    inner: S,
    user_agent: HeaderValue,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for UserAgentService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        if !req.headers().contains_key(http::header::USER_AGENT) {
            req.headers_mut()
                .insert(http::header::USER_AGENT, self.user_agent.clone());
        }
        self.inner.call(req)
    }
}
