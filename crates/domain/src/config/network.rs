use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Network sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "d_origin")]
    pub origin: String,
    #[serde(default = "d_true")]
    pub secure: bool,
    /// Long-poll timeout.  Must stay above the server's 280 s idle window.
    #[serde(default = "d_310")]
    pub subscribe_max_idle_time_secs: u64,
    #[serde(default = "d_10")]
    pub non_subscribe_timeout_secs: u64,
    /// Concurrent requests allowed on the service session.
    #[serde(default = "d_3")]
    pub maximum_connections: usize,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            origin: d_origin(),
            secure: true,
            subscribe_max_idle_time_secs: 310,
            non_subscribe_timeout_secs: 10,
            maximum_connections: 3,
            user_agent: None,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_origin() -> String {
    "ps.pndsn.com".into()
}
fn d_true() -> bool {
    true
}
fn d_310() -> u64 {
    310
}
fn d_10() -> u64 {
    10
}
fn d_3() -> usize {
    3
}
