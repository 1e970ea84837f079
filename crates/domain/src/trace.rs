use serde::Serialize;

/// Structured trace events emitted across all pn crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    RequestCompleted {
        operation: String,
        status: u16,
        duration_ms: u64,
        attempt: u32,
    },
    RetryScheduled {
        operation: String,
        attempt: u32,
        delay_ms: u64,
        reason: String,
    },
    SubscribeStateChanged {
        from: String,
        to: String,
    },
    CursorAdvanced {
        timetoken: u64,
        region: u32,
        events: usize,
    },
    HeartbeatSent {
        channels: usize,
        groups: usize,
        ok: bool,
    },
    CryptorSelected {
        identifier: String,
        source: String,
    },
    SequencePersisted {
        sequence: u16,
        ok: bool,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "pn_event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_event_tag() {
        let ev = TraceEvent::CursorAdvanced {
            timetoken: 5,
            region: 1,
            events: 2,
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "CursorAdvanced");
        assert_eq!(json["timetoken"], 5);
    }
}
