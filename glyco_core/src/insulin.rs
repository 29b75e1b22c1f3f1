//! Insulin-on-board estimation.
//!
//! Linear decay model: a bolus dose loses its effect uniformly over
//! [`ACTIVE_WINDOW`] and contributes nothing afterwards. Basal insulin is
//! recorded but never counted.

use crate::error::ensure_non_negative;
use crate::{DoseKind, MedicationDose, Result};
use chrono::{DateTime, Duration, Utc};

/// Duration over which a bolus dose decays to zero (5 hours)
pub const ACTIVE_WINDOW: Duration = Duration::hours(5);

/// Remaining active units of a single dose at `now`
///
/// Basal doses, doses older than the window and doses in the future
/// contribute zero.
pub fn remaining_units(now: DateTime<Utc>, dose: &MedicationDose) -> Result<f64> {
    let units = ensure_non_negative("dose units", dose.units)?;
    if dose.kind != DoseKind::Bolus {
        return Ok(0.0);
    }

    let age = now - dose.timestamp;
    if age < Duration::zero() || age > ACTIVE_WINDOW {
        return Ok(0.0);
    }

    let window_ms = ACTIVE_WINDOW.num_milliseconds() as f64;
    let age_ms = age.num_milliseconds() as f64;
    let fraction = ((window_ms - age_ms) / window_ms).max(0.0);
    Ok(units * fraction)
}

/// Total insulin-on-board at `now` across `doses`
pub fn compute_iob<'a, I>(now: DateTime<Utc>, doses: I) -> Result<f64>
where
    I: IntoIterator<Item = &'a MedicationDose>,
{
    let mut total = 0.0;
    for dose in doses {
        total += remaining_units(now, dose)?;
    }
    Ok(total)
}
