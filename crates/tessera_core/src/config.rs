//! # Configuration
//!
//! TOML-backed settings for scenes and the message bus. Every field has a
//! default, so a partial file (or none at all) is valid.
//!
//! ```toml
//! [scene]
//! min_free_ids = 1024
//! max_pool_slots = 65536
//! target_size = [1280, 720]
//!
//! [message_bus]
//! capacity_bytes = 65536
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ecs::{PoolLimits, MAX_INDEX};
use crate::error::ConfigError;
use crate::message::framed_size;
use crate::message::MAX_PAYLOAD;

/// Top-level configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Scene settings.
    pub scene: SceneConfig,
    /// Message bus settings.
    pub message_bus: MessageBusConfig,
}

/// Scene and entity storage settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Free entity indices held back before any is reused.
    pub min_free_ids: usize,
    /// Slots a growable component pool starts with.
    pub initial_pool_slots: usize,
    /// Slot ceiling for any component pool.
    pub max_pool_slots: usize,
    /// Record per-system `process` durations.
    pub record_system_timings: bool,
    /// Initial render target size, used for the default camera's view.
    pub target_size: [u32; 2],
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            min_free_ids: 1024,
            initial_pool_slots: 128,
            max_pool_slots: 1024 * 64,
            record_system_timings: false,
            target_size: [1280, 720],
        }
    }
}

impl SceneConfig {
    /// Pool limits derived from these settings.
    #[must_use]
    pub const fn pool_limits(&self) -> PoolLimits {
        PoolLimits {
            initial_slots: self.initial_pool_slots,
            max_slots: self.max_pool_slots,
        }
    }
}

/// Message bus settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageBusConfig {
    /// Size of each arena in bytes.
    pub capacity_bytes: usize,
    /// Whether posting is allowed.
    pub enabled: bool,
}

impl Default for MessageBusConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: 64 * 1024,
            enabled: true,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`EngineConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        tracing::info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Serializes to pretty TOML.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Serialize`].
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Writes the configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Serialize`] or [`ConfigError::Io`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let scene = &self.scene;
        if scene.max_pool_slots == 0 {
            return Err(ConfigError::Invalid("scene.max_pool_slots must be positive".into()));
        }
        if scene.initial_pool_slots > scene.max_pool_slots {
            return Err(ConfigError::Invalid(format!(
                "scene.initial_pool_slots ({}) exceeds scene.max_pool_slots ({})",
                scene.initial_pool_slots, scene.max_pool_slots
            )));
        }
        if scene.max_pool_slots > MAX_INDEX as usize + 1 {
            return Err(ConfigError::Invalid(format!(
                "scene.max_pool_slots ({}) exceeds the entity index range",
                scene.max_pool_slots
            )));
        }
        if scene.min_free_ids >= MAX_INDEX as usize {
            return Err(ConfigError::Invalid("scene.min_free_ids exceeds the entity index range".into()));
        }

        let minimum = framed_size(MAX_PAYLOAD);
        if self.message_bus.capacity_bytes < minimum {
            return Err(ConfigError::Invalid(format!(
                "message_bus.capacity_bytes must be at least {minimum}"
            )));
        }
        Ok(())
    }
}
