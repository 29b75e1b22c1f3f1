//! Patient profile provider.
//!
//! The profile (target BGL, insulin-to-carb ratio, insulin sensitivity factor)
//! comes from an external system. The core does not validate or transform it;
//! it is only passed through as context for alert rationale.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Therapy parameters supplied by the patient's care team
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PatientProfile {
    /// Target BGL in mg/dL
    #[serde(default = "default_target_bgl")]
    pub target_bgl: f64,

    /// Grams of carbohydrate covered by one unit of insulin
    #[serde(default = "default_carb_ratio")]
    pub carb_ratio: f64,

    /// mg/dL drop expected per unit of insulin
    #[serde(default = "default_sensitivity_factor")]
    pub sensitivity_factor: f64,
}

impl Default for PatientProfile {
    fn default() -> Self {
        Self {
            target_bgl: default_target_bgl(),
            carb_ratio: default_carb_ratio(),
            sensitivity_factor: default_sensitivity_factor(),
        }
    }
}

fn default_target_bgl() -> f64 {
    110.0
}

fn default_carb_ratio() -> f64 {
    10.0
}

fn default_sensitivity_factor() -> f64 {
    40.0
}

/// Source of the current patient profile
pub trait ProfileProvider: Send + Sync {
    fn profile(&self) -> PatientProfile;
}

impl ProfileProvider for PatientProfile {
    fn profile(&self) -> PatientProfile {
        self.clone()
    }
}

/// Reads the profile from a JSON file written by another system
///
/// Falls back to the configured profile when the file is missing or
/// unreadable, so a broken export never stops monitoring.
pub struct FileProfileProvider {
    path: PathBuf,
    fallback: PatientProfile,
}

impl FileProfileProvider {
    pub fn new(path: impl Into<PathBuf>, fallback: PatientProfile) -> Self {
        Self {
            path: path.into(),
            fallback,
        }
    }
}

impl ProfileProvider for FileProfileProvider {
    fn profile(&self) -> PatientProfile {
        match load_profile(&self.path) {
            Ok(Some(profile)) => profile,
            Ok(None) => self.fallback.clone(),
            Err(e) => {
                tracing::warn!(
                    "Failed to load profile at {:?}: {}. Using configured profile.",
                    self.path,
                    e
                );
                self.fallback.clone()
            }
        }
    }
}

/// Load a profile from a JSON file
///
/// Returns None if the file doesn't exist.
/// Returns an error if the file exists but is malformed.
pub fn load_profile(path: &Path) -> Result<Option<PatientProfile>> {
    if !path.exists() {
        tracing::debug!("No profile file found at {:?}", path);
        return Ok(None);
    }

    let contents = std::fs::read_to_string(path)?;
    let profile: PatientProfile = serde_json::from_str(&contents)?;
    tracing::debug!("Loaded profile from {:?}", path);
    Ok(Some(profile))
}
