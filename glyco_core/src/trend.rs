//! Trend classification from rate of change.

use crate::{Error, Result, Trend};

/// Above this rate (mg/dL/min) the value is rising
pub const UP_THRESHOLD: f64 = 1.0;

/// Above this rate (mg/dL/min) the value is rising rapidly
pub const DOUBLE_UP_THRESHOLD: f64 = 2.0;

/// Map a rate of change in mg/dL per minute to a trend.
///
/// Cut points are strict, so a rate sitting exactly on a threshold goes to
/// the less severe bucket: 1.0 is steady, 2.0 is up, -2.0 is down.
pub fn classify(delta_per_minute: f64) -> Result<Trend> {
    if delta_per_minute.is_nan() {
        return Err(Error::InvalidInput("rate of change is NaN".into()));
    }

    let trend = if delta_per_minute > DOUBLE_UP_THRESHOLD {
        Trend::DoubleUp
    } else if delta_per_minute > UP_THRESHOLD {
        Trend::Up
    } else if delta_per_minute < -DOUBLE_UP_THRESHOLD {
        Trend::DoubleDown
    } else if delta_per_minute < -UP_THRESHOLD {
        Trend::Down
    } else {
        Trend::Steady
    };
    Ok(trend)
}

/// Rate of change between two values taken `minutes` apart
pub fn rate_per_minute(delta: f64, minutes: f64) -> Result<f64> {
    if !(minutes.is_finite() && minutes > 0.0) {
        return Err(Error::InvalidInput(format!(
            "interval must be positive, got {} minutes",
            minutes
        )));
    }
    Ok(delta / minutes)
}
