mod crypto;
mod keys;
mod network;
mod observability;
mod persistence;
mod presence;
mod retry;
mod subscribe;

pub use crypto::*;
pub use keys::*;
pub use network::*;
pub use observability::*;
pub use persistence::*;
pub use presence::*;
pub use retry::*;
pub use subscribe::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub keys: KeysConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub subscribe: SubscribeConfig,
    #[serde(default)]
    pub presence: PresenceConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub crypto: CryptoConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Read and parse a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| Error::Config(format!("parsing {}: {e}", path.display())))
    }

    /// Minimal config for the given keys; everything else defaulted.
    pub fn with_keys(subscribe_key: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            keys: KeysConfig {
                subscribe_key: subscribe_key.into(),
                user_id: user_id.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn subscribe_timeout(&self) -> Duration {
        Duration::from_secs(self.network.subscribe_max_idle_time_secs)
    }

    pub fn non_subscribe_timeout(&self) -> Duration {
        Duration::from_secs(self.network.non_subscribe_timeout_secs)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.keys.subscribe_key.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "keys.subscribe_key".into(),
                message: "subscribe_key must not be empty".into(),
            });
        }

        if self.keys.user_id.trim().is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "keys.user_id".into(),
                message: "user_id must not be empty".into(),
            });
        }

        if self.network.origin.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "network.origin".into(),
                message: "origin must not be empty".into(),
            });
        }

        if self.network.maximum_connections == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "network.maximum_connections".into(),
                message: "at least one service connection is required".into(),
            });
        }

        // Server idles a long-poll for 280 s before answering empty.
        if self.network.subscribe_max_idle_time_secs < 280 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "network.subscribe_max_idle_time_secs".into(),
                message: "below the server idle window; empty polls will time out".into(),
            });
        }

        if self.retry.policy != RetryPolicyKind::None {
            let (field, delay) = match self.retry.policy {
                RetryPolicyKind::Linear => ("retry.delay_secs", self.retry.delay_secs),
                _ => ("retry.minimum_delay_secs", self.retry.minimum_delay_secs),
            };
            if delay < 2.0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: field.into(),
                    message: format!("delay {delay}s is below the recommended 2s"),
                });
            }
            if self.retry.maximum_delay_secs < self.retry.minimum_delay_secs {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: "retry.maximum_delay_secs".into(),
                    message: "maximum delay is below minimum delay".into(),
                });
            }
            if self.retry.effective_maximum_retry() > 10 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: "retry.maximum_retry".into(),
                    message: "more than 10 retries per request".into(),
                });
            }
        }

        if (1..20).contains(&self.presence.heartbeat_value_secs) {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "presence.heartbeat_value_secs".into(),
                message: "presence timeout below 20s causes spurious timeout events".into(),
            });
        }

        if self.crypto.cipher_key.is_some() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "crypto.cipher_key".into(),
                message: "plaintext cipher key in config; prefer keychain or env".into(),
            });
        }

        errors
    }
}
