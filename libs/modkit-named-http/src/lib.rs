#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Identity-scoped named HTTP clients for `ModKit`
//!
//! This crate hands out named, cached HTTP clients scoped to the calling
//! principal:
//! - A [`ClientRegistry`] keyed by (principal identity, client name)
//! - Per-client credentials (bearer token, bearer token supplier, basic auth)
//!   applied lazily before the next request
//! - JSON requests and responses with generic error-envelope handling
//! - Structured query parameters ([`query`])
//! - Cancellation per request and abort per client
//!
//! # Example
//!
//! ```ignore
//! use modkit_named_http::{ClientRegistry, PrincipalContext, query::QueryParams};
//!
//! let registry = ClientRegistry::new();
//! let ctx = PrincipalContext::new("alice");
//!
//! let catalog = registry.create(&ctx, "catalog", "https://api.example.com/v1")?;
//! catalog.authorization().set_bearer_token(token);
//!
//! let page: Vec<Product> = catalog
//!     .get("products")
//!     .query(QueryParams::new().with("page", 2))
//!     .json()
//!     .await?;
//!
//! // Retire all of alice's clients and abort their in-flight requests
//! registry.clear(&ctx).await?;
//! ```

mod auth;
pub mod binding;
mod client;
mod config;
mod envelope;
mod error;
mod headers;
mod principal;
pub mod query;
mod registry;
mod request;
mod response;
mod transport;

pub use auth::{AuthorizationState, BasicCredential, BearerCredential, Credential, TokenSupplier};
pub use client::NamedClient;
pub use config::{DEFAULT_MAX_BODY_SIZE, DEFAULT_USER_AGENT, NamedClientConfig, RegistryConfig};
pub use envelope::{ErrorEnvelope, ItemEnvelope, ResponseCode};
pub use error::{BoxError, ClientError};
pub use headers::{CONTENT_REF, HREF_FIRST, HREF_LAST, HREF_NEXT, HREF_PREV, WellKnownHeaders};
pub use principal::{PrincipalContext, PrincipalIdentity};
pub use registry::ClientRegistry;
pub use request::NamedRequest;
pub use response::ResponseEnvelope;
pub use transport::HttpTransport;

// Types that appear in the public API
pub use secrecy::SecretString;
pub use tokio_util::sync::CancellationToken;
