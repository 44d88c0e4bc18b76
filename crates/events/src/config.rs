//! Registry configuration.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use eventter_core::{EventterError, EventterResult};

/// Environment variable holding the registry name used in log records.
pub const ENV_REGISTRY_NAME: &str = "EVENTTER_REGISTRY_NAME";
/// Environment variable holding the channel typing policy (`exclusive` | `shared`).
pub const ENV_CHANNEL_TYPING: &str = "EVENTTER_CHANNEL_TYPING";

/// How payload types relate to event names.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelTyping {
    /// One concrete payload type per event name.
    ///
    /// The first subscription binds the type; the binding is released when the
    /// name's last subscription goes away. Mismatches fail at subscribe time and
    /// fail fast at notify time, before any callback runs.
    #[default]
    Exclusive,
    /// Several payload types may share a name. `notify` only reaches callbacks
    /// registered for the payload's type and skips the rest.
    Shared,
}

impl FromStr for ChannelTyping {
    type Err = EventterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exclusive" => Ok(Self::Exclusive),
            "shared" => Ok(Self::Shared),
            other => Err(EventterError::invalid_config(format!(
                "unknown channel typing '{other}' (expected 'exclusive' or 'shared')"
            ))),
        }
    }
}

/// Registry configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Name for logging
    pub name: String,
    /// Payload typing policy per event name
    pub channel_typing: ChannelTyping,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            name: "eventter".to_string(),
            channel_typing: ChannelTyping::Exclusive,
        }
    }
}

impl RegistryConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_channel_typing(mut self, typing: ChannelTyping) -> Self {
        self.channel_typing = typing;
        self
    }

    /// Build a configuration from `EVENTTER_*` environment variables.
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> EventterResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup (environment, file, test map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> EventterResult<Self> {
        let mut config = Self::default();

        if let Some(name) = lookup(ENV_REGISTRY_NAME) {
            let name = name.trim();
            if name.is_empty() {
                return Err(EventterError::invalid_config(format!(
                    "{ENV_REGISTRY_NAME} must not be empty"
                )));
            }
            config.name = name.to_string();
        }

        if let Some(typing) = lookup(ENV_CHANNEL_TYPING) {
            config.channel_typing = typing.parse()?;
        }

        Ok(config)
    }
}
