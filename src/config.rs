//! Engine configuration.
//!
//! The core never reads files or the environment; callers build an
//! [`EngineConfig`] themselves or load one from JSON.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Default maximum depth of nested function calls.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 4_096;

/// Tunables for a [`StatService`](crate::StatService).
///
/// Missing fields take their default value when deserializing.
///
/// # Examples
///
/// ```rust
/// use statexpr::EngineConfig;
///
/// let config = EngineConfig::from_json(r#"{ "dice_seed": 42 }"#).unwrap();
/// assert_eq!(config.dice_seed, Some(42));
/// assert_eq!(config.max_call_depth, 4_096);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How deep user function calls may nest before evaluation fails.
    pub max_call_depth: usize,

    /// Seed for the dice roller. `None` seeds from system entropy.
    pub dice_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            dice_seed: None,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize this configuration to JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_dice_seed(mut self, seed: u64) -> Self {
        self.dice_seed = Some(seed);
        self
    }
}
