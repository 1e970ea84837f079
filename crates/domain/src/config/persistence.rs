use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Persisted client state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Keep the publish sequence number in the OS keychain across runs.
    #[serde(default = "d_true")]
    pub enabled: bool,
    #[serde(default = "d_service")]
    pub keychain_service: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            keychain_service: d_service(),
        }
    }
}

fn d_true() -> bool {
    true
}
fn d_service() -> String {
    "pn-client".into()
}
