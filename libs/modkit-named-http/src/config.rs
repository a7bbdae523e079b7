//! Configuration for the client registry and the named clients it creates.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default User-Agent string for named client requests
pub const DEFAULT_USER_AGENT: &str = concat!("modkit-named-http/", env!("CARGO_PKG_VERSION"));

/// Default maximum response body size (10 MiB)
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Registry configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Removal attempts per key during `clear` before reporting failure.
    #[serde(default = "default_clear_retry_attempts")]
    pub clear_retry_attempts: u32,

    /// Fixed delay between removal attempts of a contended key.
    #[serde(default = "default_clear_retry_delay", with = "humantime_serde")]
    pub clear_retry_delay: Duration,

    /// Settings applied to every client created by the registry.
    pub client: NamedClientConfig,
}

fn default_clear_retry_attempts() -> u32 {
    5
}

fn default_clear_retry_delay() -> Duration {
    Duration::from_millis(42)
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            clear_retry_attempts: default_clear_retry_attempts(),
            clear_retry_delay: default_clear_retry_delay(),
            client: NamedClientConfig::default(),
        }
    }
}

/// Per-client transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NamedClientConfig {
    /// Timeout for a single request, including reading the body.
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum accepted response body size in bytes.
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_owned()
}

fn default_max_body_size() -> usize {
    DEFAULT_MAX_BODY_SIZE
}

impl Default for NamedClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
            max_body_size: default_max_body_size(),
        }
    }
}

/// `Duration` fields in humantime form (`"42ms"`, `"30s"`).
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        humantime::parse_duration(&raw).map_err(de::Error::custom)
    }
}
