use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Subscribe loop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where the subscribe loop resumes after an outage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconnectFrom {
    /// Resume at the last confirmed cursor and catch up on the backlog.
    #[default]
    LastCursor,
    /// Drop the backlog and resume from the server's current time.
    Now,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeConfig {
    #[serde(default)]
    pub filter_expression: Option<String>,
    /// Keep the cursor when channels are added or removed mid-poll.
    #[serde(default = "d_true")]
    pub keep_timetoken_on_list_change: bool,
    #[serde(default)]
    pub reconnect_from: ReconnectFrom,
    /// Batch size that triggers a `RequestMessageCountExceeded` status.
    /// `0` disables the check.
    #[serde(default)]
    pub request_message_count_threshold: usize,
    /// Recently delivered messages remembered for de-duplication.
    /// `0` disables the cache.
    #[serde(default = "d_100")]
    pub maximum_messages_cache_size: usize,
    #[serde(default)]
    pub suppress_leave_events: bool,
}

impl Default for SubscribeConfig {
    fn default() -> Self {
        Self {
            filter_expression: None,
            keep_timetoken_on_list_change: true,
            reconnect_from: ReconnectFrom::LastCursor,
            request_message_count_threshold: 0,
            maximum_messages_cache_size: 100,
            suppress_leave_events: false,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_true() -> bool {
    true
}
fn d_100() -> usize {
    100
}
