//! Environment-driven configuration for the player binary.

use std::path::Path;

use thiserror::Error;
use url::Url;

use agentdeck_shared::{ChannelName, UnknownChannel};

use crate::state::{OrderingPolicy, UnknownOrdering};

pub const DEFAULT_RELAY_URL: &str = "ws://localhost:7880/data";

const RELAY_URL_VAR: &str = "AGENTDECK_RELAY_URL";
/// Name used by the dev scripts
const LEGACY_RELAY_URL_VAR: &str = "RELAY_WS_URL";
const CHANNELS_VAR: &str = "AGENTDECK_CHANNELS";
const ORDERING_VAR: &str = "AGENTDECK_ORDERING";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid relay URL {url}: {source}")]
    InvalidRelayUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("relay URL {0} must use ws:// or wss://")]
    UnsupportedScheme(String),
    #[error(transparent)]
    UnknownChannel(#[from] UnknownChannel),
    #[error(transparent)]
    UnknownOrdering(#[from] UnknownOrdering),
    #[error("AGENTDECK_CHANNELS names no channels")]
    NoChannels,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerConfig {
    pub relay_url: Url,
    pub channels: Vec<ChannelName>,
    pub ordering: OrderingPolicy,
}

impl PlayerConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from a variable lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let raw_url = var(RELAY_URL_VAR)
            .or_else(|| var(LEGACY_RELAY_URL_VAR))
            .unwrap_or_else(|| DEFAULT_RELAY_URL.to_string());
        let relay_url = Url::parse(&raw_url).map_err(|source| ConfigError::InvalidRelayUrl {
            url: raw_url.clone(),
            source,
        })?;
        if !matches!(relay_url.scheme(), "ws" | "wss") {
            return Err(ConfigError::UnsupportedScheme(raw_url));
        }

        let channels = match var(CHANNELS_VAR) {
            Some(list) => parse_channels(&list)?,
            None => ChannelName::ALL.to_vec(),
        };

        let ordering = match var(ORDERING_VAR) {
            Some(policy) => policy.parse()?,
            None => OrderingPolicy::default(),
        };

        Ok(Self {
            relay_url,
            channels,
            ordering,
        })
    }
}

fn parse_channels(list: &str) -> Result<Vec<ChannelName>, ConfigError> {
    let mut channels = Vec::new();
    for name in list.split(',').map(str::trim).filter(|name| !name.is_empty()) {
        let channel: ChannelName = name.parse()?;
        if !channels.contains(&channel) {
            channels.push(channel);
        }
    }
    if channels.is_empty() {
        return Err(ConfigError::NoChannels);
    }
    Ok(channels)
}

/// Load `.env.local` then `.env` from the repository root, if present.
pub fn load_dotenv_from_repo_root() {
    let repo_root = Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            if let Err(e) = dotenvy::from_path(&path) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to load env file");
            }
        }
    }
}
