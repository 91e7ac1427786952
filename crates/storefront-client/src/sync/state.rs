//! Live State Reducer
//!
//! Both producers feed the same reducer. Whatever arrives last for a
//! channel is what the viewer sees.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use storefront_core::{Channel, LiveEvent, LiveSnapshot};

/// What the viewer's session currently knows about the live channels
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    channels: BTreeMap<Channel, serde_json::Value>,

    /// A push stream is currently open
    pub push_connected: bool,

    /// Successful reconciliation polls so far
    pub polls: u64,
}

impl SyncState {
    pub fn get(&self, channel: Channel) -> Option<&serde_json::Value> {
        self.channels.get(&channel)
    }

    pub fn channels(&self) -> &BTreeMap<Channel, serde_json::Value> {
        &self.channels
    }

    /// Apply one pushed event. Returns whether anything changed.
    pub fn apply_event(&mut self, event: &LiveEvent) -> bool {
        self.set(event.channel, &event.payload)
    }

    /// Apply a polled snapshot; channels missing from it are kept.
    pub fn apply_snapshot(&mut self, snapshot: &LiveSnapshot) -> bool {
        self.polls += 1;
        snapshot
            .channels
            .iter()
            .fold(false, |changed, (channel, value)| self.set(*channel, value) || changed)
    }

    pub(crate) fn set_push_connected(&mut self, connected: bool) -> bool {
        let changed = self.push_connected != connected;
        self.push_connected = connected;
        changed
    }

    fn set(&mut self, channel: Channel, value: &serde_json::Value) -> bool {
        if self.channels.get(&channel) == Some(value) {
            return false;
        }
        self.channels.insert(channel, value.clone());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_last_received_wins_across_producers() {
        let mut state = SyncState::default();

        assert!(state.apply_event(&LiveEvent::new(Channel::Schedule, json!({"monday": "20:00"}))));

        let mut snapshot = LiveSnapshot::default();
        snapshot.channels.insert(Channel::Schedule, json!({"monday": "21:00"}));
        assert!(state.apply_snapshot(&snapshot));
        assert_eq!(state.get(Channel::Schedule), Some(&json!({"monday": "21:00"})));

        assert!(state.apply_event(&LiveEvent::new(Channel::Schedule, json!({"monday": "22:00"}))));
        assert_eq!(state.get(Channel::Schedule), Some(&json!({"monday": "22:00"})));
    }

    #[test]
    fn test_duplicate_delivery_is_not_a_change() {
        let mut state = SyncState::default();
        let event = LiveEvent::new(Channel::Theme, json!({"accent": "#ff0066"}));
        assert!(state.apply_event(&event));
        assert!(!state.apply_event(&event));
    }

    #[test]
    fn test_snapshot_keeps_unlisted_channels() {
        let mut state = SyncState::default();
        state.apply_event(&LiveEvent::new(Channel::Tags, json!(["speedrun"])));

        let mut snapshot = LiveSnapshot::default();
        snapshot.channels.insert(Channel::LiveStatus, json!({"live": true}));
        state.apply_snapshot(&snapshot);

        assert!(state.get(Channel::Tags).is_some());
        assert!(state.get(Channel::LiveStatus).is_some());
        assert_eq!(state.polls, 1);
    }
}
