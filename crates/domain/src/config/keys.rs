use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Account keys and identity
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeysConfig {
    /// Required for publish and signal.
    #[serde(default)]
    pub publish_key: Option<String>,
    #[serde(default)]
    pub subscribe_key: String,
    /// When set, every request is signed (v2 signature).
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Access-manager token sent as `auth`.
    #[serde(default)]
    pub auth_key: Option<String>,
    /// Identity reported as `uuid` on every request.  Must not be empty.
    #[serde(default)]
    pub user_id: String,
}
