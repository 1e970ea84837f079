use serde::{Deserialize, Serialize};
use std::time::Duration;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Presence heartbeat
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Which heartbeat outcomes are surfaced to listeners as statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeartbeatNotifications {
    None,
    Success,
    #[default]
    Failure,
    All,
}

impl HeartbeatNotifications {
    pub fn reports_success(self) -> bool {
        matches!(self, Self::Success | Self::All)
    }

    pub fn reports_failure(self) -> bool {
        matches!(self, Self::Failure | Self::All)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Presence timeout announced to the server.  `0` disables it.
    #[serde(default = "d_300")]
    pub heartbeat_value_secs: u64,
    /// `0` derives the interval from the value.
    #[serde(default)]
    pub heartbeat_interval_secs: u64,
    #[serde(default)]
    pub heartbeat_notifications: HeartbeatNotifications,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            heartbeat_value_secs: 300,
            heartbeat_interval_secs: 0,
            heartbeat_notifications: HeartbeatNotifications::Failure,
        }
    }
}

impl PresenceConfig {
    /// Effective heartbeat period, or `None` when heartbeats are off.
    pub fn effective_interval(&self) -> Option<Duration> {
        if self.heartbeat_interval_secs > 0 {
            return Some(Duration::from_secs(self.heartbeat_interval_secs));
        }
        match self.heartbeat_value_secs {
            0 => None,
            v => Some(Duration::from_secs((v / 2).saturating_sub(1).max(1))),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_300() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_interval_is_half_value_minus_one() {
        let cfg = PresenceConfig::default();
        assert_eq!(cfg.effective_interval(), Some(Duration::from_secs(149)));
    }

    #[test]
    fn explicit_interval_wins() {
        let cfg = PresenceConfig {
            heartbeat_interval_secs: 30,
            ..Default::default()
        };
        assert_eq!(cfg.effective_interval(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn zero_value_disables_heartbeat() {
        let cfg = PresenceConfig {
            heartbeat_value_secs: 0,
            ..Default::default()
        };
        assert!(cfg.effective_interval().is_none());
    }

    #[test]
    fn notifications_parse_lowercase() {
        let cfg: PresenceConfig = toml::from_str(r#"heartbeat_notifications = "all""#).unwrap();
        assert!(cfg.heartbeat_notifications.reports_success());
        assert!(cfg.heartbeat_notifications.reports_failure());
    }
}
