//! Named logical channels multiplexed over one transport connection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Channel names the adapter filters on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelName {
    /// Game-master world state
    WorldState,
    /// Commerce assistant shopping state
    ShoppingState,
}

impl ChannelName {
    pub const ALL: [ChannelName; 2] = [ChannelName::WorldState, ChannelName::ShoppingState];

    /// Wire identifier (the transport topic)
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelName::WorldState => "world_state",
            ChannelName::ShoppingState => "shopping_state",
        }
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown channel: {0}")]
pub struct UnknownChannel(pub String);

impl FromStr for ChannelName {
    type Err = UnknownChannel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        ChannelName::ALL
            .into_iter()
            .find(|channel| channel.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownChannel(trimmed.to_string()))
    }
}
