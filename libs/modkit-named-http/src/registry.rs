//! Identity-scoped registry of named clients.
//!
//! Key = (principal identity, client name). Two principals asking for the same
//! name get independent clients with their own transports and credentials; the
//! same principal asking twice either gets an error ([`ClientRegistry::create`])
//! or the existing client ([`ClientRegistry::create_or_update`]).
//!
//! Every operation that touches entries resolves the principal from an
//! explicit [`PrincipalContext`] and fails with
//! [`ClientError::PrincipalMissing`] for anonymous callers.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info, warn};

use crate::client::NamedClient;
use crate::config::RegistryConfig;
use crate::error::ClientError;
use crate::principal::{PrincipalContext, PrincipalIdentity};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RegistryKey {
    principal: PrincipalIdentity,
    name: Arc<str>,
}

impl RegistryKey {
    fn new(principal: PrincipalIdentity, name: &str) -> Self {
        Self {
            principal,
            name: Arc::from(name),
        }
    }
}

/// Registry of [`NamedClient`]s scoped to the calling principal.
///
/// Entries are only retired by [`ClientRegistry::clear`]; callers keep using
/// the `Arc` they got until then.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: DashMap<RegistryKey, Arc<NamedClient>>,
    config: RegistryConfig,
}

impl ClientRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            clients: DashMap::new(),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a new client for the calling principal.
    ///
    /// # Errors
    /// - [`ClientError::PrincipalMissing`] if the context has no usable identity
    /// - [`ClientError::AlreadyExists`] if the principal already has a client
    ///   with this name
    /// - [`ClientError::InvalidUri`] if `base_url` is not an absolute
    ///   `http`/`https` URL
    pub fn create(
        &self,
        ctx: &PrincipalContext,
        name: &str,
        base_url: &str,
    ) -> Result<Arc<NamedClient>, ClientError> {
        let key = RegistryKey::new(ctx.identity()?, name);

        match self.clients.entry(key) {
            Entry::Occupied(_) => Err(ClientError::AlreadyExists {
                name: name.to_owned(),
            }),
            Entry::Vacant(slot) => {
                let client = Arc::new(NamedClient::new(name, base_url, &self.config.client)?);
                info!(
                    principal = %slot.key().principal,
                    client = name,
                    base_url = %client.base_url(),
                    "named client created"
                );
                slot.insert(Arc::clone(&client));
                Ok(client)
            }
        }
    }

    /// Return the principal's client with this name, pointing it at
    /// `base_url`, or create it.
    ///
    /// An existing client keeps its transport and credentials; changing its
    /// base URL aborts its in-flight requests.
    ///
    /// # Errors
    /// - [`ClientError::PrincipalMissing`] if the context has no usable identity
    /// - [`ClientError::InvalidUri`] if `base_url` is not an absolute
    ///   `http`/`https` URL
    pub fn create_or_update(
        &self,
        ctx: &PrincipalContext,
        name: &str,
        base_url: &str,
    ) -> Result<Arc<NamedClient>, ClientError> {
        let key = RegistryKey::new(ctx.identity()?, name);

        match self.clients.entry(key) {
            Entry::Occupied(existing) => {
                let client = existing.get();
                client.set_base_url(base_url)?;
                Ok(Arc::clone(client))
            }
            Entry::Vacant(slot) => {
                let client = Arc::new(NamedClient::new(name, base_url, &self.config.client)?);
                info!(
                    principal = %slot.key().principal,
                    client = name,
                    base_url = %client.base_url(),
                    "named client created"
                );
                slot.insert(Arc::clone(&client));
                Ok(client)
            }
        }
    }

    /// Look up the principal's client without creating it.
    ///
    /// # Errors
    /// Returns [`ClientError::PrincipalMissing`] if the context has no usable
    /// identity.
    pub fn get(
        &self,
        ctx: &PrincipalContext,
        name: &str,
    ) -> Result<Option<Arc<NamedClient>>, ClientError> {
        let key = RegistryKey::new(ctx.identity()?, name);
        Ok(self.clients.get(&key).map(|entry| Arc::clone(entry.value())))
    }

    /// Remove and abort every client of the calling principal.
    ///
    /// Each key is retried up to `clear_retry_attempts` times, waiting
    /// `clear_retry_delay` between attempts while its map shard is busy.
    /// Removal is best-effort: a key that stays busy is skipped and the
    /// remaining keys are still processed.
    ///
    /// Returns `false` if any client could not be removed.
    ///
    /// # Errors
    /// Returns [`ClientError::PrincipalMissing`] if the context has no usable
    /// identity.
    pub async fn clear(&self, ctx: &PrincipalContext) -> Result<bool, ClientError> {
        let principal = ctx.identity()?;
        let all_removed = self.remove_all(self.keys_of(&principal)).await;
        info!(principal = %principal, all_removed, "named clients cleared");
        Ok(all_removed)
    }

    fn keys_of(&self, principal: &PrincipalIdentity) -> Vec<RegistryKey> {
        self.clients
            .iter()
            .filter(|entry| entry.key().principal == *principal)
            .map(|entry| entry.key().clone())
            .collect()
    }

    async fn remove_all(&self, keys: Vec<RegistryKey>) -> bool {
        let mut all_removed = true;
        for key in keys {
            if !self.remove_with_retry(&key).await {
                warn!(
                    principal = %key.principal,
                    client = %key.name,
                    attempts = self.config.clear_retry_attempts,
                    "failed to remove named client"
                );
                all_removed = false;
            }
        }
        all_removed
    }

    /// `true` once the key is gone, whether removed here or concurrently.
    async fn remove_with_retry(&self, key: &RegistryKey) -> bool {
        let attempts = self.config.clear_retry_attempts.max(1);
        for attempt in 1..=attempts {
            match self.clients.try_entry(key.clone()) {
                Some(Entry::Occupied(entry)) => {
                    let (_, client) = entry.remove_entry();
                    client.abort();
                    debug!(client = %key.name, attempt, "named client removed");
                    return true;
                }
                Some(Entry::Vacant(_)) => return true,
                None if attempt < attempts => {
                    tokio::time::sleep(self.config.clear_retry_delay).await;
                }
                None => {}
            }
        }
        false
    }

    /// Number of clients across all principals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
