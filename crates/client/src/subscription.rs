//! Subscription set, client state cache and cursor.
//!
//! The subscribe actor is the only writer; the client facade and the
//! heartbeat manager read through [`SharedSubscription`].

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use pn_domain::{Cursor, PRESENCE_SUFFIX};
use serde_json::Value;

/// Channels and groups currently subscribed.
///
/// A name subscribed with presence also carries its `-pnpres` entry;
/// removing the name removes both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionSet {
    channels: BTreeSet<String>,
    groups: BTreeSet<String>,
}

fn presence_name(name: &str) -> String {
    format!("{name}{PRESENCE_SUFFIX}")
}

fn is_presence(name: &str) -> bool {
    name.ends_with(PRESENCE_SUFFIX)
}

fn add(set: &mut BTreeSet<String>, names: &[String], with_presence: bool) -> Vec<String> {
    let mut added = Vec::new();
    for name in names {
        if set.insert(name.clone()) {
            added.push(name.clone());
        }
        if with_presence && !is_presence(name) {
            let p = presence_name(name);
            if set.insert(p.clone()) {
                added.push(p);
            }
        }
    }
    added
}

fn remove(set: &mut BTreeSet<String>, names: &[String]) -> Vec<String> {
    let mut removed = Vec::new();
    for name in names {
        if set.remove(name) {
            removed.push(name.clone());
        }
        if !is_presence(name) {
            let p = presence_name(name);
            if set.remove(&p) {
                removed.push(p);
            }
        }
    }
    removed
}

impl SubscriptionSet {
    /// Returns the names that were not already present.
    pub fn add_channels(&mut self, names: &[String], with_presence: bool) -> Vec<String> {
        add(&mut self.channels, names, with_presence)
    }

    pub fn add_groups(&mut self, names: &[String], with_presence: bool) -> Vec<String> {
        add(&mut self.groups, names, with_presence)
    }

    /// Returns the names actually removed, presence entries included.
    pub fn remove_channels(&mut self, names: &[String]) -> Vec<String> {
        remove(&mut self.channels, names)
    }

    pub fn remove_groups(&mut self, names: &[String]) -> Vec<String> {
        remove(&mut self.groups, names)
    }

    pub fn channels(&self) -> Vec<String> {
        self.channels.iter().cloned().collect()
    }

    pub fn groups(&self) -> Vec<String> {
        self.groups.iter().cloned().collect()
    }

    /// Channels without presence pseudo-channels, for heartbeat and state.
    pub fn non_presence_channels(&self) -> Vec<String> {
        self.channels.iter().filter(|c| !is_presence(c)).cloned().collect()
    }

    pub fn non_presence_groups(&self) -> Vec<String> {
        self.groups.iter().filter(|g| !is_presence(g)).cloned().collect()
    }

    pub fn contains_channel(&self, name: &str) -> bool {
        self.channels.contains(name)
    }

    pub fn contains_group(&self, name: &str) -> bool {
        self.groups.contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty() && self.groups.is_empty()
    }
}

/// Everything the subscribe loop owns that other contexts may read.
#[derive(Debug, Default)]
pub struct SubscribeSnapshot {
    pub set: SubscriptionSet,
    /// Per-channel / per-group presence state.
    pub state: HashMap<String, Value>,
    pub cursor: Cursor,
}

impl SubscribeSnapshot {
    /// Drop state for names no longer subscribed.
    pub fn prune_state(&mut self) {
        let set = &self.set;
        self.state
            .retain(|name, _| set.contains_channel(name) || set.contains_group(name));
    }

    /// `state` query value: one JSON object keyed by name, or `None`
    /// when nothing is cached.
    pub fn state_json(&self) -> Option<String> {
        if self.state.is_empty() {
            return None;
        }
        let map: serde_json::Map<String, Value> = self
            .state
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        serde_json::to_string(&map).ok()
    }
}

pub type SharedSubscription = Arc<RwLock<SubscribeSnapshot>>;

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn presence_entries_are_paired() {
        let mut set = SubscriptionSet::default();
        let added = set.add_channels(&names(&["room1", "room2"]), true);
        assert_eq!(added.len(), 4);
        assert!(set.contains_channel("room1-pnpres"));
        assert_eq!(set.non_presence_channels(), names(&["room1", "room2"]));

        let removed = set.remove_channels(&names(&["room1"]));
        assert_eq!(removed, names(&["room1", "room1-pnpres"]));
        assert!(!set.contains_channel("room1-pnpres"));
        assert!(set.contains_channel("room2-pnpres"));
    }

    #[test]
    fn pairing_holds_across_mixed_operations() {
        let mut set = SubscriptionSet::default();
        let ops: Vec<(bool, &str, bool)> = vec![
            (true, "a", true),
            (true, "b", false),
            (false, "a", false),
            (true, "c", true),
            (true, "a", true),
            (false, "c", false),
            (true, "b", true),
        ];
        for (add, name, presence) in ops {
            if add {
                set.add_channels(&names(&[name]), presence);
            } else {
                set.remove_channels(&names(&[name]));
            }
            for ch in set.channels() {
                if let Some(base) = ch.strip_suffix(PRESENCE_SUFFIX) {
                    assert!(set.contains_channel(base), "orphan presence entry {ch}");
                }
            }
        }
        assert_eq!(set.channels(), names(&["a", "a-pnpres", "b", "b-pnpres"]));
    }

    #[test]
    fn removing_only_presence_keeps_channel() {
        let mut set = SubscriptionSet::default();
        set.add_groups(&names(&["g"]), true);
        let removed = set.remove_groups(&names(&["g-pnpres"]));
        assert_eq!(removed, names(&["g-pnpres"]));
        assert!(set.contains_group("g"));
    }

    #[test]
    fn state_is_pruned_with_the_set() {
        let mut snap = SubscribeSnapshot::default();
        snap.set.add_channels(&names(&["a", "b"]), false);
        snap.state.insert("a".into(), serde_json::json!({"mood": "ok"}));
        snap.state.insert("b".into(), serde_json::json!({"mood": "meh"}));
        snap.set.remove_channels(&names(&["b"]));
        snap.prune_state();
        assert_eq!(snap.state.len(), 1);
        assert_eq!(snap.state_json().unwrap(), r#"{"a":{"mood":"ok"}}"#);
    }
}
