//! Service configuration types for Handover.
//!
//! `ServiceConfig` represents the top-level `handover.toml` that controls
//! the responder pipeline, takeover timeouts, and server settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration for the Handover service.
///
/// Loaded from `handover.toml` next to the data directory. All fields
/// have sensible defaults so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub responder: ResponderConfig,

    #[serde(default)]
    pub takeover: TakeoverConfig,
}

/// HTTP/WebSocket listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the listener binds, e.g. "127.0.0.1:8090".
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Directory holding the SQLite database. Created if missing.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8090".to_string()
}

fn default_data_dir() -> String {
    "./data".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            data_dir: default_data_dir(),
        }
    }
}

/// Responder pipeline settings: retries, circuit breaker, cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponderConfig {
    /// Attempts per provider call before falling back.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay before the first retry. Doubles on each attempt.
    #[serde(default = "default_retry_base_delay_secs")]
    pub retry_base_delay_secs: u64,

    /// Per-attempt timeout for provider calls.
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,

    /// Consecutive failures before the circuit opens.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// How long the circuit stays open before a half-open probe.
    #[serde(default = "default_breaker_cooldown_secs")]
    pub breaker_cooldown_secs: u64,

    /// Lifetime of cached replies.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_secs() -> u64 {
    1
}

fn default_provider_timeout_secs() -> u64 {
    30
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_breaker_cooldown_secs() -> u64 {
    300
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_base_delay_secs: default_retry_base_delay_secs(),
            provider_timeout_secs: default_provider_timeout_secs(),
            failure_threshold: default_failure_threshold(),
            breaker_cooldown_secs: default_breaker_cooldown_secs(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl ResponderConfig {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_secs(self.retry_base_delay_secs)
    }

    pub fn breaker_cooldown(&self) -> Duration {
        Duration::from_secs(self.breaker_cooldown_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Ownership arbitration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TakeoverConfig {
    /// Ownership lapses after this much admin inactivity.
    #[serde(default = "default_inactivity_timeout_secs")]
    pub inactivity_timeout_secs: u64,

    /// How often the background sweep checks for lapsed owners.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_inactivity_timeout_secs() -> u64 {
    300
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl Default for TakeoverConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout_secs: default_inactivity_timeout_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl TakeoverConfig {
    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
