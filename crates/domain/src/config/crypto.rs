use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Payload encryption
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Cipher key sources, resolved in order: plaintext `cipher_key`, the OS
/// keychain entry, `cipher_key_env`, then `{SERVICE}_{ACCOUNT}` from the
/// environment.  When nothing resolves, payloads travel unencrypted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoConfig {
    /// Plaintext key in the config file.  Discouraged; logs a warning.
    #[serde(default)]
    pub cipher_key: Option<String>,
    #[serde(default)]
    pub cipher_key_env: Option<String>,
    #[serde(default)]
    pub keychain_service: Option<String>,
    #[serde(default)]
    pub keychain_account: Option<String>,
    #[serde(default = "d_true")]
    pub random_iv: bool,
    /// Encrypt with the legacy cryptor instead of AES-CBC with header.
    #[serde(default)]
    pub legacy_default: bool,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            cipher_key: None,
            cipher_key_env: None,
            keychain_service: None,
            keychain_account: None,
            random_iv: true,
            legacy_default: false,
        }
    }
}

fn d_true() -> bool {
    true
}
