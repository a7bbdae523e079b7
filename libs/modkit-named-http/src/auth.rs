//! Per-client authorization state.
//!
//! A client holds one active [`Credential`]. Setting a credential only records
//! it and bumps a revision counter; the `Authorization` header value is
//! materialized lazily before the next request. Every request receives its own
//! snapshot of the header, so changing credentials never affects a request
//! that is already in flight.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::HeaderValue;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{BoxError, ClientError};

/// Asynchronous source of bearer tokens, e.g. an OAuth2 client-credentials flow.
///
/// Called once per credential revision: after a supplier is installed, and
/// again after [`AuthorizationState::invalidate`].
#[async_trait]
pub trait TokenSupplier: Send + Sync {
    /// Produce the current access token.
    ///
    /// # Errors
    /// Returns an error if no token can be obtained.
    async fn token(&self) -> Result<SecretString, BoxError>;
}

/// HTTP Basic credential with the encoded token computed up front.
pub struct BasicCredential {
    username: String,
    token: SecretString,
}

impl BasicCredential {
    /// Encode `base64(username:password)`.
    #[must_use]
    pub fn new(username: impl Into<String>, password: &str) -> Self {
        let username = username.into();
        let joined = Zeroizing::new(format!("{username}:{password}"));
        Self {
            token: SecretString::from(STANDARD.encode(joined.as_bytes())),
            username,
        }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }
}

impl fmt::Debug for BasicCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicCredential")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Bearer credential backed by a static token, a supplier, or both.
///
/// The supplier wins when both are present.
#[derive(Default)]
pub struct BearerCredential {
    token: Option<SecretString>,
    supplier: Option<Arc<dyn TokenSupplier>>,
}

impl BearerCredential {
    #[must_use]
    pub fn from_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(SecretString::from(token.into())),
            supplier: None,
        }
    }

    #[must_use]
    pub fn from_supplier(supplier: Arc<dyn TokenSupplier>) -> Self {
        Self {
            token: None,
            supplier: Some(supplier),
        }
    }

    /// Keep a static token as well as the supplier.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(SecretString::from(token.into()));
        self
    }

    async fn resolve(&self) -> Result<Option<HeaderValue>, ClientError> {
        if let Some(supplier) = &self.supplier {
            let token = supplier.token().await.map_err(ClientError::TokenSupplier)?;
            return sensitive_header("Bearer", token.expose_secret()).map(Some);
        }
        match &self.token {
            Some(token) => sensitive_header("Bearer", token.expose_secret()).map(Some),
            None => Ok(None),
        }
    }
}

impl fmt::Debug for BearerCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerCredential")
            .field("has_token", &self.token.is_some())
            .field("has_supplier", &self.supplier.is_some())
            .finish()
    }
}

/// Active credential of a client.
#[derive(Debug, Default)]
pub enum Credential {
    #[default]
    None,
    Basic(BasicCredential),
    Bearer(BearerCredential),
}

impl Credential {
    fn scheme(&self) -> &'static str {
        match self {
            Credential::None => "none",
            Credential::Basic(_) => "basic",
            Credential::Bearer(_) => "bearer",
        }
    }
}

#[derive(Debug, Default)]
struct CredentialSlot {
    credential: Arc<Credential>,
    revision: u64,
}

#[derive(Debug, Default)]
struct Materialized {
    header: Option<HeaderValue>,
    revision: u64,
}

/// Credential plus the lazily materialized `Authorization` header.
#[derive(Debug, Default)]
pub struct AuthorizationState {
    slot: parking_lot::Mutex<CredentialSlot>,
    materialized: tokio::sync::Mutex<Materialized>,
    applied: AtomicU64,
}

impl AuthorizationState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active credential and mark the header dirty.
    pub fn set_credential(&self, credential: Credential) {
        let mut slot = self.slot.lock();
        slot.credential = Arc::new(credential);
        slot.revision += 1;
    }

    pub fn set_bearer_token(&self, token: impl Into<String>) {
        self.set_credential(Credential::Bearer(BearerCredential::from_token(token)));
    }

    pub fn set_bearer_supplier(&self, supplier: Arc<dyn TokenSupplier>) {
        self.set_credential(Credential::Bearer(BearerCredential::from_supplier(
            supplier,
        )));
    }

    pub fn set_basic(&self, username: impl Into<String>, password: &str) {
        self.set_credential(Credential::Basic(BasicCredential::new(username, password)));
    }

    /// Remove any credential; the next request is sent without `Authorization`.
    pub fn clear_credential(&self) {
        self.set_credential(Credential::None);
    }

    /// Mark the header dirty without changing the credential, so a token
    /// supplier is asked again before the next request.
    pub fn invalidate(&self) {
        self.slot.lock().revision += 1;
    }

    /// `true` if the credential changed since the header was last materialized.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.slot.lock().revision != self.applied.load(Ordering::Acquire)
    }

    /// Rebuild the header if the credential changed.
    ///
    /// Returns `true` if a refresh happened.
    ///
    /// # Errors
    /// Returns [`ClientError::TokenSupplier`] if the bearer supplier fails (the
    /// state stays dirty), or [`ClientError::InvalidHeaderValue`] if the token
    /// cannot be used as a header value.
    pub async fn refresh_if_dirty(&self) -> Result<bool, ClientError> {
        let mut materialized = self.materialized.lock().await;
        self.refresh_locked(&mut materialized).await
    }

    /// Refresh if dirty and return the header to attach to one request.
    ///
    /// # Errors
    /// Same as [`AuthorizationState::refresh_if_dirty`].
    pub async fn header_for_request(&self) -> Result<Option<HeaderValue>, ClientError> {
        let mut materialized = self.materialized.lock().await;
        self.refresh_locked(&mut materialized).await?;
        Ok(materialized.header.clone())
    }

    async fn refresh_locked(&self, materialized: &mut Materialized) -> Result<bool, ClientError> {
        let (credential, revision) = {
            let slot = self.slot.lock();
            (Arc::clone(&slot.credential), slot.revision)
        };
        if revision == materialized.revision {
            return Ok(false);
        }

        materialized.header = None;
        materialized.header = match credential.as_ref() {
            Credential::None => None,
            Credential::Basic(basic) => {
                Some(sensitive_header("Basic", basic.token.expose_secret())?)
            }
            Credential::Bearer(bearer) => bearer.resolve().await?,
        };
        materialized.revision = revision;
        self.applied.store(revision, Ordering::Release);

        debug!(
            revision,
            scheme = credential.scheme(),
            has_header = materialized.header.is_some(),
            "authorization header refreshed"
        );
        Ok(true)
    }
}

fn sensitive_header(scheme: &str, secret: &str) -> Result<HeaderValue, ClientError> {
    let raw = Zeroizing::new(format!("{scheme} {secret}"));
    let mut value = HeaderValue::from_str(&raw)?;
    value.set_sensitive(true);
    Ok(value)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingSupplier {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenSupplier for CountingSupplier {
        async fn token(&self) -> Result<SecretString, BoxError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(SecretString::from(format!("tok-{n}")))
        }
    }

    struct FailingSupplier;

    #[async_trait]
    impl TokenSupplier for FailingSupplier {
        async fn token(&self) -> Result<SecretString, BoxError> {
            Err("identity provider unavailable".into())
        }
    }

    fn header_str(value: Option<&HeaderValue>) -> Option<&str> {
        value.and_then(|v| v.to_str().ok())
    }

    #[tokio::test]
    async fn fresh_state_has_no_header() {
        let state = AuthorizationState::new();
        assert!(!state.is_dirty());
        assert!(!state.refresh_if_dirty().await.unwrap());
        assert!(state.header_for_request().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bearer_token_is_applied_on_next_request() {
        let state = AuthorizationState::new();
        state.set_bearer_token("abc");
        assert!(state.is_dirty());

        let header = state.header_for_request().await.unwrap();
        assert_eq!(header_str(header.as_ref()), Some("Bearer abc"));
        assert!(header.unwrap().is_sensitive());
        assert!(!state.is_dirty());
    }

    #[tokio::test]
    async fn basic_credential_is_precomputed() {
        let basic = BasicCredential::new("user", "pass");
        assert_eq!(basic.token.expose_secret(), "dXNlcjpwYXNz");

        let state = AuthorizationState::new();
        state.set_basic("user", "pass");
        let header = state.header_for_request().await.unwrap();
        assert_eq!(header_str(header.as_ref()), Some("Basic dXNlcjpwYXNz"));
    }

    #[tokio::test]
    async fn refresh_is_noop_when_clean() {
        let state = AuthorizationState::new();
        state.set_bearer_token("abc");
        assert!(state.refresh_if_dirty().await.unwrap());
        assert!(!state.refresh_if_dirty().await.unwrap());
    }

    #[tokio::test]
    async fn clearing_credential_removes_header() {
        let state = AuthorizationState::new();
        state.set_bearer_token("abc");
        state.header_for_request().await.unwrap();

        state.clear_credential();
        assert!(state.header_for_request().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bearer_without_source_sends_no_header() {
        let state = AuthorizationState::new();
        state.set_credential(Credential::Bearer(BearerCredential::default()));
        assert!(state.refresh_if_dirty().await.unwrap());
        assert!(state.header_for_request().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn supplier_is_called_once_per_revision() {
        let supplier = Arc::new(CountingSupplier {
            calls: AtomicUsize::new(0),
        });
        let state = AuthorizationState::new();
        state.set_bearer_supplier(supplier.clone());

        for _ in 0..3 {
            let header = state.header_for_request().await.unwrap();
            assert_eq!(header_str(header.as_ref()), Some("Bearer tok-1"));
        }
        assert_eq!(supplier.calls.load(Ordering::SeqCst), 1);

        state.invalidate();
        let header = state.header_for_request().await.unwrap();
        assert_eq!(header_str(header.as_ref()), Some("Bearer tok-2"));
    }

    #[tokio::test]
    async fn supplier_wins_over_static_token() {
        let supplier = Arc::new(CountingSupplier {
            calls: AtomicUsize::new(0),
        });
        let state = AuthorizationState::new();
        state.set_credential(Credential::Bearer(
            BearerCredential::from_supplier(supplier).with_token("static"),
        ));
        let header = state.header_for_request().await.unwrap();
        assert_eq!(header_str(header.as_ref()), Some("Bearer tok-1"));
    }

    #[tokio::test]
    async fn supplier_failure_keeps_state_dirty() {
        let state = AuthorizationState::new();
        state.set_bearer_token("old");
        state.header_for_request().await.unwrap();

        state.set_bearer_supplier(Arc::new(FailingSupplier));
        let err = state.header_for_request().await.unwrap_err();
        assert!(matches!(err, ClientError::TokenSupplier(_)));
        assert!(state.is_dirty());

        state.set_bearer_token("new");
        let header = state.header_for_request().await.unwrap();
        assert_eq!(header_str(header.as_ref()), Some("Bearer new"));
    }

    #[tokio::test]
    async fn snapshot_is_not_affected_by_later_changes() {
        let state = AuthorizationState::new();
        state.set_bearer_token("first");
        let snapshot = state.header_for_request().await.unwrap();

        state.set_bearer_token("second");
        state.header_for_request().await.unwrap();
        assert_eq!(header_str(snapshot.as_ref()), Some("Bearer first"));
    }

    #[tokio::test]
    async fn control_characters_are_rejected() {
        let state = AuthorizationState::new();
        state.set_bearer_token("bad\ntoken");
        let err = state.header_for_request().await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidHeaderValue(_)));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let basic = format!("{:?}", BasicCredential::new("user", "hunter2"));
        assert!(basic.contains("user"));
        assert!(!basic.contains("hunter2"));
        assert!(!basic.contains("dXNlcjpodW50ZXIy"));

        let bearer = format!("{:?}", BearerCredential::from_token("s3cr3t"));
        assert!(!bearer.contains("s3cr3t"));
    }
}
