//! Configuration for observers and hosts.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::mutation::MutationKind;

/// Flags requested from the host mutation feed.
///
/// The default is the fixed configuration every observer subscribes with:
/// attribute and character data records are requested for hosts that insist
/// on them, and then discarded by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObserveConfig {
    /// Request attribute change records.
    pub attributes: bool,
    /// Request child list records. Must be true.
    pub child_list: bool,
    /// Request character data records.
    pub character_data: bool,
}

impl Default for ObserveConfig {
    fn default() -> Self {
        Self {
            attributes: true,
            child_list: true,
            character_data: true,
        }
    }
}

impl ObserveConfig {
    /// Rejects configurations that cannot drive the dispatcher.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.child_list {
            return Err(ConfigError::ChildListDisabled);
        }
        Ok(())
    }

    /// Whether records of `kind` are requested.
    #[must_use]
    pub const fn observes(&self, kind: MutationKind) -> bool {
        match kind {
            MutationKind::ChildList => self.child_list,
            MutationKind::Attributes => self.attributes,
            MutationKind::CharacterData => self.character_data,
        }
    }
}

/// Engine-level knobs shared by every observer created from one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WatchConfig {
    /// Flags passed to the host feed on subscribe.
    pub observe: ObserveConfig,
    /// Buffer size of in-memory notification streams.
    pub notification_capacity: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            observe: ObserveConfig::default(),
            notification_capacity: 1024,
        }
    }
}

impl WatchConfig {
    /// Parses a JSON configuration; missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(json).map_err(|e| ConfigError::InvalidOptions {
            reason: format!("invalid watch config: {e}"),
        })?;
        cfg.observe.validate()?;
        Ok(cfg)
    }
}
