//! Live Events
//!
//! Admin mutations travel to viewers as a [`LiveEvent`] on one of a fixed
//! set of channels. Every payload is the full new state of its channel, so
//! applying the same event twice is harmless.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// Content areas that are pushed to connected clients
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Content,
    Schedule,
    LiveStatus,
    FeaturedVideo,
    Tags,
    Streams,
    Theme,
}

impl Channel {
    pub const ALL: [Self; 7] = [
        Self::Content,
        Self::Schedule,
        Self::LiveStatus,
        Self::FeaturedVideo,
        Self::Tags,
        Self::Streams,
        Self::Theme,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Schedule => "schedule",
            Self::LiveStatus => "live_status",
            Self::FeaturedVideo => "featured_video",
            Self::Tags => "tags",
            Self::Streams => "streams",
            Self::Theme => "theme",
        }
    }
}

impl FromStr for Channel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|channel| channel.as_str() == s)
            .ok_or_else(|| CoreError::UnknownChannel(s.to_string()))
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pushed mutation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LiveEvent {
    pub channel: Channel,
    pub payload: serde_json::Value,
    pub emitted_at: DateTime<Utc>,
}

impl LiveEvent {
    pub fn new(channel: Channel, payload: serde_json::Value) -> Self {
        Self {
            channel,
            payload,
            emitted_at: Utc::now(),
        }
    }
}

/// Full current state of every channel that has been set, as returned by
/// the reconciliation poll
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveSnapshot {
    pub channels: BTreeMap<Channel, serde_json::Value>,
    pub taken_at: Option<DateTime<Utc>>,
}

impl LiveSnapshot {
    pub fn get(&self, channel: Channel) -> Option<&serde_json::Value> {
        self.channels.get(&channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_round_trip_names() {
        for channel in Channel::ALL {
            assert_eq!(channel.as_str().parse::<Channel>().unwrap(), channel);
            let json = serde_json::to_string(&channel).unwrap();
            assert_eq!(json, format!("\"{}\"", channel.as_str()));
        }
        assert!("weather".parse::<Channel>().is_err());
    }

    #[test]
    fn test_snapshot_serializes_channel_keys() {
        let mut snapshot = LiveSnapshot::default();
        snapshot
            .channels
            .insert(Channel::LiveStatus, serde_json::json!({"live": true}));
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["channels"]["live_status"]["live"], true);
    }
}
