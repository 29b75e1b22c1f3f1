//! Configuration file support for Glyco.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/glyco/config.toml`.

use crate::profile::PatientProfile;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub generator: GeneratorConfig,

    #[serde(default)]
    pub profile: PatientProfile,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Retention bounds per event stream
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
    #[serde(default = "default_retention")]
    pub max_readings: usize,

    #[serde(default = "default_retention")]
    pub max_meals: usize,

    #[serde(default = "default_retention")]
    pub max_doses: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_readings: default_retention(),
            max_meals: default_retention(),
            max_doses: default_retention(),
        }
    }
}

/// Synthetic reading generator parameters
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GeneratorConfig {
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u32,

    /// Starting BGL for a fresh simulation (mg/dL)
    #[serde(default = "default_initial_value")]
    pub initial_value: f64,

    /// Offset applied to UTC when evaluating hour-of-day drift
    #[serde(default)]
    pub utc_offset_minutes: i32,

    /// Fixed RNG seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            initial_value: default_initial_value(),
            utc_offset_minutes: 0,
            seed: None,
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        std::env::var("HOME")
            .map(|home| PathBuf::from(home).join(".local/share"))
            .unwrap_or_else(|_| PathBuf::from("."))
    });
    base.join("glyco")
}

fn default_retention() -> usize {
    1000
}

fn default_interval_minutes() -> u32 {
    5
}

fn default_initial_value() -> f64 {
    120.0
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            std::env::var("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .unwrap_or_else(|_| PathBuf::from("."))
        });
        base.join("glyco").join("config.toml")
    }

    /// Reject values the core cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.store.max_readings == 0 || self.store.max_meals == 0 || self.store.max_doses == 0 {
            return Err(Error::Config("retention bounds must be at least 1".into()));
        }
        if self.generator.interval_minutes == 0 {
            return Err(Error::Config("generator interval must be at least 1 minute".into()));
        }
        let initial = self.generator.initial_value;
        if !initial.is_finite() || !(40.0..=400.0).contains(&initial) {
            return Err(Error::Config(format!(
                "initial_value must be within [40, 400], got {}",
                initial
            )));
        }
        if self.generator.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(Error::Config("utc_offset_minutes must be less than a day".into()));
        }
        Ok(())
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
