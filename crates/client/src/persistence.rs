//! Secrets and small persisted state.
//!
//! The publish sequence counter survives restarts through a
//! [`SecureStore`]; the OS keychain by default, an in-memory map in tests
//! and headless setups.  Cipher keys resolve through the same keychain.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use pn_domain::config::{Config, CryptoConfig};
use pn_domain::error::{Error, Result};
use pn_domain::trace::TraceEvent;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stores
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Minimal key/value secret storage.  A missing key is `Ok(None)`.
pub trait SecureStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// OS keychain (macOS Keychain, Windows Credential Manager, Secret
/// Service on Linux).  Keys are keychain accounts under one service.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, key)
            .map_err(|e| Error::Persistence(format!("keyring entry creation failed: {e}")))
    }
}

impl SecureStore for KeyringStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(Error::Persistence(format!("keyring get_password failed: {e}"))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .map_err(|e| Error::Persistence(format!("keyring set_password failed: {e}")))
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecureStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values.lock().insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Publish sequence
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Store key for a client's publish sequence.
pub fn sequence_key(config: &Config) -> String {
    format!(
        "{}:{}:publish-sequence",
        config.keys.subscribe_key, config.keys.user_id
    )
}

/// Per-client publish sequence number, `1..=65535`, wrapping to 1.
pub struct PublishSequence {
    store: Option<Arc<dyn SecureStore>>,
    key: String,
    current: Mutex<u16>,
}

impl PublishSequence {
    /// Seed from the store.  Missing or unreadable state starts at 0.
    pub fn load(store: Option<Arc<dyn SecureStore>>, key: impl Into<String>) -> Self {
        let key = key.into();
        let current = match store.as_ref().map(|s| s.get(&key)) {
            Some(Ok(Some(raw))) => raw.trim().parse::<u16>().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "stored publish sequence unreadable, starting at 0");
                0
            }),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "publish sequence lookup failed, starting at 0");
                0
            }
            Some(Ok(None)) | None => 0,
        };
        Self {
            store,
            key,
            current: Mutex::new(current),
        }
    }

    pub fn current(&self) -> u16 {
        *self.current.lock()
    }

    /// Advance and persist.  A store failure is logged, never returned.
    pub fn next(&self) -> u16 {
        let mut current = self.current.lock();
        *current = if *current == u16::MAX { 1 } else { *current + 1 };
        let value = *current;
        if let Some(ref store) = self.store {
            let ok = match store.set(&self.key, &value.to_string()) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to persist publish sequence");
                    false
                }
            };
            TraceEvent::SequencePersisted {
                sequence: value,
                ok,
            }
            .emit();
        }
        value
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Cipher key resolution
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Resolve the cipher key from a [`CryptoConfig`].
///
/// Precedence:
/// 1. `cipher_key` (plaintext, warns)
/// 2. `keychain_service` + `keychain_account` in the OS keychain
/// 3. `cipher_key_env`
/// 4. Headless fallback: env var `{SERVICE}_{ACCOUNT}` uppercased
///
/// `Ok(None)` when nothing is configured.  A named env var that is not
/// set is an error so a misconfigured client never publishes plaintext.
pub fn resolve_cipher_key(crypto: &CryptoConfig) -> Result<Option<String>> {
    if let Some(ref key) = crypto.cipher_key {
        tracing::warn!(
            "cipher key loaded from plaintext config field 'cipher_key'; \
             prefer 'cipher_key_env' or the keychain"
        );
        return Ok(Some(key.clone()));
    }

    let keychain = match (&crypto.keychain_service, &crypto.keychain_account) {
        (Some(service), Some(account)) => Some((service.as_str(), account.as_str())),
        _ => None,
    };

    if let Some((service, account)) = keychain {
        match KeyringStore::new(service).get(account) {
            Ok(Some(secret)) => return Ok(Some(secret)),
            Ok(None) => {
                tracing::warn!(service, account, "no keychain entry, falling through to env");
            }
            Err(e) => {
                tracing::warn!(
                    service,
                    account,
                    error = %e,
                    "keychain lookup failed, falling through to env"
                );
            }
        }
    }

    if let Some(ref env_var) = crypto.cipher_key_env {
        return std::env::var(env_var).map(Some).map_err(|_| {
            Error::Config(format!(
                "environment variable '{env_var}' not set or not valid UTF-8"
            ))
        });
    }

    if let Some((service, account)) = keychain {
        let fallback_var = keychain_fallback_env_name(service, account);
        if let Ok(val) = std::env::var(&fallback_var) {
            tracing::info!(
                env_var = %fallback_var,
                "cipher key resolved from keychain headless fallback env var"
            );
            return Ok(Some(val));
        }
        return Err(Error::Config(format!(
            "cipher key not found in keychain '{service}/{account}' or env '{fallback_var}'"
        )));
    }

    Ok(None)
}

/// `("pn-client", "cipher-key")` → `"PN_CLIENT_CIPHER_KEY"`.
pub fn keychain_fallback_env_name(service: &str, account: &str) -> String {
    format!(
        "{}_{}",
        service.to_uppercase().replace('-', "_"),
        account.to_uppercase().replace('-', "_"),
    )
}
