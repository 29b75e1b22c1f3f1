//! Threshold alert decision table.
//!
//! The severity tier depends only on BGL and trend. IOB and the patient
//! profile feed the rationale text (projected trajectory) and never move a
//! reading between tiers, so [`classify_severity`] can be tested on its own.

use crate::error::ensure_non_negative;
use crate::profile::PatientProfile;
use crate::{Result, Trend};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Below this BGL is critical hypoglycemia
pub const HYPO_CRITICAL: f64 = 70.0;
/// Below this BGL (and at or above [`HYPO_CRITICAL`]) is a low warning
pub const LOW_WARNING: f64 = 80.0;
/// Above this BGL is a high warning
pub const HIGH_WARNING: f64 = 180.0;
/// Above this BGL is critical hyperglycemia
pub const HYPER_CRITICAL: f64 = 250.0;

/// Alert severity tier
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::None => f.write_str("none"),
            Severity::Warning => f.write_str("warning"),
            Severity::Critical => f.write_str("critical"),
        }
    }
}

/// Which side of the range triggered the alert
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Hypoglycemia,
    Hyperglycemia,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Hypoglycemia => f.write_str("hypoglycemia"),
            Condition::Hyperglycemia => f.write_str("hyperglycemia"),
        }
    }
}

/// Outcome of evaluating one reading
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlertVerdict {
    pub alert: bool,
    pub severity: Severity,
    pub condition: Option<Condition>,
    pub rationale: String,
}

/// Payload handed to the notification collaborator
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlertNotice {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub bgl: u16,
    pub trend: Trend,
    pub rationale: String,
}

/// The decision table, first match wins
pub fn classify_severity(bgl: f64, trend: Trend) -> (Severity, Option<Condition>) {
    if bgl < HYPO_CRITICAL || trend == Trend::DoubleDown {
        (Severity::Critical, Some(Condition::Hypoglycemia))
    } else if bgl > HYPER_CRITICAL || trend == Trend::DoubleUp {
        (Severity::Critical, Some(Condition::Hyperglycemia))
    } else if bgl < LOW_WARNING {
        (Severity::Warning, Some(Condition::Hypoglycemia))
    } else if bgl > HIGH_WARNING {
        (Severity::Warning, Some(Condition::Hyperglycemia))
    } else {
        (Severity::None, None)
    }
}

/// Evaluate a reading against the alert thresholds
///
/// Fails with [`crate::Error::InvalidInput`] for NaN, infinite or negative
/// BGL or IOB.
pub fn evaluate(bgl: f64, trend: Trend, iob: f64) -> Result<AlertVerdict> {
    let bgl = ensure_non_negative("bgl", bgl)?;
    let iob = ensure_non_negative("iob", iob)?;

    let (severity, condition) = classify_severity(bgl, trend);

    let mut rationale = match (severity, condition) {
        (Severity::Critical, Some(Condition::Hypoglycemia)) => format!(
            "Critical low: {:.0} mg/dL trending {}. Treat with fast-acting carbohydrate.",
            bgl, trend
        ),
        (Severity::Critical, Some(Condition::Hyperglycemia)) => format!(
            "Critical high: {:.0} mg/dL trending {}. Check ketones and consider a correction.",
            bgl, trend
        ),
        (Severity::Warning, Some(Condition::Hypoglycemia)) => format!(
            "Approaching low: {:.0} mg/dL trending {}.",
            bgl, trend
        ),
        (Severity::Warning, Some(Condition::Hyperglycemia)) => format!(
            "Above range: {:.0} mg/dL trending {}.",
            bgl, trend
        ),
        _ => format!("In range: {:.0} mg/dL trending {}.", bgl, trend),
    };

    if iob > 0.0 {
        rationale.push_str(&format!(" {:.1} U insulin on board.", iob));
    }

    Ok(AlertVerdict {
        alert: severity != Severity::None,
        severity,
        condition,
        rationale,
    })
}

/// Commentary on where active insulin is expected to take the BGL
///
/// Uses the profile's sensitivity factor as-is. Returns None without IOB.
pub fn projection_note(bgl: f64, iob: f64, profile: &PatientProfile) -> Option<String> {
    if !(iob.is_finite() && iob > 0.0) {
        return None;
    }

    let drop = iob * profile.sensitivity_factor;
    let projected = bgl - drop;
    let note = if projected < HYPO_CRITICAL {
        format!(
            "Active insulin may lower BGL by ~{:.0} mg/dL to ~{:.0}, below the hypoglycemia threshold.",
            drop, projected
        )
    } else {
        format!(
            "Active insulin may lower BGL by ~{:.0} mg/dL to ~{:.0} (target {:.0}).",
            drop, projected, profile.target_bgl
        )
    };
    Some(note)
}
