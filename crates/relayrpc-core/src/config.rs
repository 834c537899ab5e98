//! Gateway configuration, loadable from a JSON file.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::DEFAULT_CAPACITY_PER_METHOD;
use crate::peer::Peer;
use crate::policy::{CircuitBreakerConfig, RetryConfig};
use crate::pool::PeerPoolConfig;
use crate::registry::RegistryConfig;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level gateway configuration. Every field has a default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Timeout for one outbound peer request.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Re-selections after a transport failure.
    #[serde(default = "default_max_reselects")]
    pub max_reselects: u32,
    /// Probe each peer's p2p port before selecting it.
    #[serde(default)]
    pub probe_reachability: bool,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub circuit_breaker: CircuitConfig,
    /// Seed peers.
    #[serde(default)]
    pub peers: Vec<Peer>,
    #[serde(default)]
    pub log: LogConfig,
}

/// Cache sizing and per-method TTL overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_capacity")]
    pub capacity_per_method: usize,
    /// method name → ttl seconds (0 disables caching for that method)
    #[serde(default)]
    pub ttl_overrides: HashMap<String, u64>,
}

/// Per-peer circuit breaker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_open_duration_secs")]
    pub open_duration_secs: u64,
}

/// Log level per component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Global default level: "trace" | "debug" | "info" | "warn" | "error"
    #[serde(default = "default_level")]
    pub level: String,
    /// Override per component: crate name → level
    #[serde(default)]
    pub components: HashMap<String, String>,
    /// Emit JSON structured logs (true) or human-readable text (false)
    #[serde(default)]
    pub json: bool,
}

fn default_request_timeout_ms() -> u64 { 3_000 }
fn default_max_reselects() -> u32 { 1 }
fn default_probe_timeout_ms() -> u64 { 1_000 }
fn default_capacity() -> usize { DEFAULT_CAPACITY_PER_METHOD }
fn default_failure_threshold() -> u32 { 3 }
fn default_open_duration_secs() -> u64 { 30 }
fn default_level() -> String { "info".into() }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            max_reselects: default_max_reselects(),
            probe_reachability: false,
            probe_timeout_ms: default_probe_timeout_ms(),
            cache: CacheConfig::default(),
            circuit_breaker: CircuitConfig::default(),
            peers: Vec::new(),
            log: LogConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity_per_method: default_capacity(),
            ttl_overrides: HashMap::new(),
        }
    }
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            open_duration_secs: default_open_duration_secs(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            components: HashMap::new(),
            json: false,
        }
    }
}

impl GatewayConfig {
    /// Load and validate a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Parse and validate a JSON config document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("request_timeout_ms must be > 0".into()));
        }
        if self.cache.capacity_per_method == 0 {
            return Err(ConfigError::Invalid("cache.capacity_per_method must be > 0".into()));
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "circuit_breaker.failure_threshold must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Effective TTL for `method`, given its built-in default.
    pub fn ttl_for(&self, method: &str, default_secs: u64) -> u64 {
        self.cache
            .ttl_overrides
            .get(method)
            .copied()
            .unwrap_or(default_secs)
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            retry: RetryConfig {
                max_reselects: self.max_reselects,
                ..RetryConfig::default()
            },
        }
    }

    pub fn pool_config(&self) -> PeerPoolConfig {
        PeerPoolConfig {
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: self.circuit_breaker.failure_threshold,
                open_duration: Duration::from_secs(self.circuit_breaker.open_duration_secs),
                success_threshold: 1,
            },
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
        }
    }
}
