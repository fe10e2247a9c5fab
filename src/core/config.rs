//! Cache configuration
//!
//! Tuning knobs for heat decay and eviction, loadable from RON or JSON.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Heat and eviction tuning for a [`Registry`](crate::assets::Registry)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Heat added on a cycle where the asset was used
    pub heat_increment: u32,
    /// Upper bound for heat
    pub max_heat: u32,
    /// Number of live assets below which nothing is evicted
    pub baseline_num_assets: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            heat_increment: 2,
            max_heat: 300,
            baseline_num_assets: 100,
        }
    }
}

impl CacheConfig {
    /// Set the heat gained per used cycle
    #[must_use]
    pub fn with_heat_increment(mut self, increment: u32) -> Self {
        self.heat_increment = increment;
        self
    }

    /// Set the heat ceiling
    #[must_use]
    pub fn with_max_heat(mut self, max_heat: u32) -> Self {
        self.max_heat = max_heat;
        self
    }

    /// Set the population threshold at which cold assets start being dropped
    #[must_use]
    pub fn with_baseline(mut self, baseline: usize) -> Self {
        self.baseline_num_assets = baseline;
        self
    }

    /// Check that the configuration can drive heat decay
    ///
    /// # Errors
    ///
    /// Returns an error if `heat_increment` or `max_heat` is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heat_increment == 0 {
            return Err(ConfigError::Invalid("heat_increment must be positive".into()));
        }
        if self.max_heat == 0 {
            return Err(ConfigError::Invalid("max_heat must be positive".into()));
        }
        Ok(())
    }

    /// Parse and validate a configuration from a RON string
    ///
    /// # Errors
    ///
    /// Returns an error if parsing or validation fails
    pub fn from_ron_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated
    pub fn load_ron(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_ron_str(&content)
    }

    /// Save the configuration to a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialization fails
    pub fn save_ron(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let ron_string = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        fs::write(path, ron_string).map_err(|e| ConfigError::Io(e.to_string()))?;
        Ok(())
    }

    /// Load a configuration from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: Self =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration to a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialization fails
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json_string =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        fs::write(path, json_string).map_err(|e| ConfigError::Io(e.to_string()))?;
        Ok(())
    }
}

/// Errors that can occur while loading a configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// IO error
    Io(String),
    /// Serialization or deserialization error
    Parse(String),
    /// A value is out of range
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::Parse(e) => write!(f, "Parse error: {e}"),
            Self::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
