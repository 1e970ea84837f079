use serde::{Deserialize, Serialize};

use crate::operation::Endpoint;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request retry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryPolicyKind {
    None,
    Linear,
    #[default]
    Exponential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default)]
    pub policy: RetryPolicyKind,
    /// Fixed delay for the linear policy.
    #[serde(default = "d_2")]
    pub delay_secs: f64,
    #[serde(default = "d_2")]
    pub minimum_delay_secs: f64,
    #[serde(default = "d_150")]
    pub maximum_delay_secs: f64,
    /// Defaults to 10 for linear and 6 for exponential.
    #[serde(default)]
    pub maximum_retry: Option<u32>,
    /// Endpoint groups that never retry automatically.
    #[serde(default)]
    pub excluded_endpoints: Vec<Endpoint>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            policy: RetryPolicyKind::Exponential,
            delay_secs: 2.0,
            minimum_delay_secs: 2.0,
            maximum_delay_secs: 150.0,
            maximum_retry: None,
            excluded_endpoints: Vec::new(),
        }
    }
}

impl RetryConfig {
    pub fn effective_maximum_retry(&self) -> u32 {
        match (self.maximum_retry, self.policy) {
            (Some(n), _) => n,
            (None, RetryPolicyKind::Linear) => 10,
            (None, RetryPolicyKind::Exponential) => 6,
            (None, RetryPolicyKind::None) => 0,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_2() -> f64 {
    2.0
}
fn d_150() -> f64 {
    150.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maximum_retry_defaults_follow_policy() {
        let mut cfg = RetryConfig::default();
        assert_eq!(cfg.effective_maximum_retry(), 6);
        cfg.policy = RetryPolicyKind::Linear;
        assert_eq!(cfg.effective_maximum_retry(), 10);
        cfg.maximum_retry = Some(3);
        assert_eq!(cfg.effective_maximum_retry(), 3);
    }

    #[test]
    fn excluded_endpoints_parse() {
        let cfg: RetryConfig = toml::from_str(
            r#"
            policy = "linear"
            excluded_endpoints = ["message_send", "presence"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.policy, RetryPolicyKind::Linear);
        assert_eq!(
            cfg.excluded_endpoints,
            vec![Endpoint::MessageSend, Endpoint::Presence]
        );
    }
}
