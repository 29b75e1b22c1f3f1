//! Synthetic glucose reading generator.
//!
//! Each step perturbs the current value with a handful of physiological
//! heuristics:
//! - circadian drift (dawn phenomenon, lunch bump, otherwise noise)
//! - a post-meal spike when a meal was logged within the last hour
//! - a pull-down proportional to insulin-on-board
//! - mean reversion outside [80, 180]
//! - final sensor noise
//!
//! Randomness is an input: seed the generator for reproducible runs.

use crate::error::ensure_non_negative;
use crate::trend::{classify, rate_per_minute};
use crate::{Error, GeneratorConfig, Result, Trend, MAX_BGL, MIN_BGL};
use chrono::{DateTime, FixedOffset, Timelike, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// mg/dL removed per unit of insulin-on-board per step
pub const IOB_PULL: f64 = 0.5;
/// Correction applied above [`REVERSION_HIGH`] or below [`REVERSION_LOW`]
pub const REVERSION_STEP: f64 = 3.0;
pub const REVERSION_HIGH: f64 = 180.0;
pub const REVERSION_LOW: f64 = 80.0;

const DAWN_DRIFT: (f64, f64) = (1.0, 4.0);
const LUNCH_DRIFT: (f64, f64) = (0.0, 2.0);
const BASELINE_NOISE: f64 = 2.0;
const MEAL_SPIKE: (f64, f64) = (5.0, 15.0);
const SENSOR_NOISE: f64 = 3.0;

/// Individual terms that made up one step's delta
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DeltaBreakdown {
    pub circadian: f64,
    pub meal: f64,
    pub insulin: f64,
    pub reversion: f64,
    pub noise: f64,
}

impl DeltaBreakdown {
    pub fn total(&self) -> f64 {
        self.circadian + self.meal + self.insulin + self.reversion + self.noise
    }
}

/// Result of one generation step
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeneratedSample {
    /// Rounded, clamped value to record
    pub value: u16,
    pub trend: Trend,
    pub delta_per_minute: f64,
    pub breakdown: DeltaBreakdown,
}

/// Simulation state for one patient
#[derive(Debug, Clone)]
pub struct ReadingGenerator {
    current_value: f64,
    current_trend: Trend,
    interval_minutes: u32,
    utc_offset: FixedOffset,
    rng: StdRng,
}

impl ReadingGenerator {
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        if config.interval_minutes == 0 {
            return Err(Error::Config("generator interval must be at least 1 minute".into()));
        }
        let utc_offset = FixedOffset::east_opt(config.utc_offset_minutes * 60).ok_or_else(|| {
            Error::Config(format!("invalid utc offset: {} minutes", config.utc_offset_minutes))
        })?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Ok(Self {
            current_value: clamp_bgl(config.initial_value),
            current_trend: Trend::Steady,
            interval_minutes: config.interval_minutes,
            utc_offset,
            rng,
        })
    }

    pub fn current_value(&self) -> f64 {
        self.current_value
    }

    pub fn current_trend(&self) -> Trend {
        self.current_trend
    }

    pub fn interval_minutes(&self) -> u32 {
        self.interval_minutes
    }

    /// Sync state to an externally observed reading
    pub fn overwrite(&mut self, value: f64, trend: Trend) {
        self.current_value = clamp_bgl(value);
        self.current_trend = trend;
    }

    /// Advance the simulation by one interval
    pub fn step(&mut self, now: DateTime<Utc>, meal_within_hour: bool, iob: f64) -> Result<GeneratedSample> {
        let iob = ensure_non_negative("iob", iob)?;
        let hour = now.with_timezone(&self.utc_offset).hour();

        let breakdown = DeltaBreakdown {
            circadian: self.circadian_drift(hour),
            meal: if meal_within_hour {
                self.rng.random_range(MEAL_SPIKE.0..=MEAL_SPIKE.1)
            } else {
                0.0
            },
            insulin: -iob * IOB_PULL,
            reversion: reversion(self.current_value),
            noise: self.rng.random_range(-SENSOR_NOISE..=SENSOR_NOISE),
        };

        let total = breakdown.total();
        self.current_value = clamp_bgl(self.current_value + total);

        let delta_per_minute = rate_per_minute(total, f64::from(self.interval_minutes))?;
        self.current_trend = classify(delta_per_minute)?;

        Ok(GeneratedSample {
            value: round_bgl(self.current_value),
            trend: self.current_trend,
            delta_per_minute,
            breakdown,
        })
    }

    fn circadian_drift(&mut self, hour: u32) -> f64 {
        match hour {
            5..=7 => self.rng.random_range(DAWN_DRIFT.0..=DAWN_DRIFT.1),
            12 => self.rng.random_range(LUNCH_DRIFT.0..=LUNCH_DRIFT.1),
            _ => self.rng.random_range(-BASELINE_NOISE..=BASELINE_NOISE),
        }
    }
}

fn reversion(value: f64) -> f64 {
    if value > REVERSION_HIGH {
        -REVERSION_STEP
    } else if value < REVERSION_LOW {
        REVERSION_STEP
    } else {
        0.0
    }
}

fn clamp_bgl(value: f64) -> f64 {
    value.clamp(f64::from(MIN_BGL), f64::from(MAX_BGL))
}

pub(crate) fn round_bgl(value: f64) -> u16 {
    clamp_bgl(value).round() as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn seeded(initial: f64, seed: u64) -> ReadingGenerator {
        ReadingGenerator::new(&GeneratorConfig {
            interval_minutes: 5,
            initial_value: initial,
            utc_offset_minutes: 0,
            seed: Some(seed),
        })
        .unwrap()
    }

    fn at_hour(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 14, hour, 30, 0).unwrap()
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = seeded(120.0, 99);
        let mut b = seeded(120.0, 99);
        for i in 0..50 {
            let now = at_hour(i % 24);
            assert_eq!(a.step(now, i % 7 == 0, 1.0).unwrap(), b.step(now, i % 7 == 0, 1.0).unwrap());
        }
    }

    #[test]
    fn test_values_stay_in_domain() {
        let mut generator = seeded(390.0, 1);
        for i in 0..500 {
            let sample = generator.step(at_hour(i % 24), true, 0.0).unwrap();
            assert!((MIN_BGL..=MAX_BGL).contains(&sample.value));
        }

        let mut generator = seeded(45.0, 2);
        for i in 0..500 {
            let sample = generator.step(at_hour(i % 24), false, 40.0).unwrap();
            assert!((MIN_BGL..=MAX_BGL).contains(&sample.value));
        }
        assert_eq!(generator.current_value(), f64::from(MIN_BGL));
    }

    #[test]
    fn test_dawn_drift_is_upward() {
        let mut generator = seeded(120.0, 3);
        for _ in 0..100 {
            let sample = generator.step(at_hour(6), false, 0.0).unwrap();
            assert!(sample.breakdown.circadian >= 1.0 && sample.breakdown.circadian <= 4.0);
            generator.overwrite(120.0, Trend::Steady);
        }
    }

    #[test]
    fn test_lunch_drift_is_mild_upward() {
        let mut generator = seeded(120.0, 4);
        for _ in 0..100 {
            let sample = generator.step(at_hour(12), false, 0.0).unwrap();
            assert!(sample.breakdown.circadian >= 0.0 && sample.breakdown.circadian <= 2.0);
        }
    }

    #[test]
    fn test_window_end_hours_are_baseline() {
        // 08:xx and 13:xx fall outside the dawn and lunch windows
        for hour in [8, 13] {
            let mut generator = seeded(120.0, 12);
            let drifts: Vec<f64> = (0..100)
                .map(|_| generator.step(at_hour(hour), false, 0.0).unwrap().breakdown.circadian)
                .collect();
            assert!(drifts.iter().any(|d| *d < 0.0), "no downward drift at {}:00", hour);
            assert!(drifts.iter().all(|d| (-2.0..=2.0).contains(d)));
        }
    }

    #[test]
    fn test_utc_offset_shifts_hour_of_day() {
        let mut generator = ReadingGenerator::new(&GeneratorConfig {
            utc_offset_minutes: 6 * 60,
            seed: Some(5),
            ..GeneratorConfig::default()
        })
        .unwrap();
        // 00:30 UTC is 06:30 local
        for _ in 0..50 {
            let sample = generator.step(at_hour(0), false, 0.0).unwrap();
            assert!(sample.breakdown.circadian >= 1.0);
        }
    }

    #[test]
    fn test_meal_spike_only_with_recent_meal() {
        let mut generator = seeded(120.0, 6);
        let with_meal = generator.step(at_hour(18), true, 0.0).unwrap();
        assert!(with_meal.breakdown.meal >= 5.0 && with_meal.breakdown.meal <= 15.0);

        let without = generator.step(at_hour(18), false, 0.0).unwrap();
        assert_eq!(without.breakdown.meal, 0.0);
    }

    #[test]
    fn test_heavy_insulin_pulls_down_fast() {
        let mut generator = seeded(200.0, 7);
        let sample = generator.step(at_hour(6), true, 100.0).unwrap();
        assert_eq!(sample.breakdown.insulin, -50.0);
        assert!(sample.value < 200);
        assert_eq!(sample.trend, Trend::DoubleDown);
    }

    #[test]
    fn test_mean_reversion_terms() {
        let mut high = seeded(250.0, 8);
        assert_eq!(high.step(at_hour(15), false, 0.0).unwrap().breakdown.reversion, -3.0);

        let mut low = seeded(60.0, 8);
        assert_eq!(low.step(at_hour(15), false, 0.0).unwrap().breakdown.reversion, 3.0);

        let mut mid = seeded(120.0, 8);
        assert_eq!(mid.step(at_hour(15), false, 0.0).unwrap().breakdown.reversion, 0.0);
    }

    #[test]
    fn test_trend_derived_from_total_delta() {
        let mut generator = seeded(120.0, 9);
        for i in 0..200 {
            let sample = generator.step(at_hour(i % 24), i % 5 == 0, 0.5).unwrap();
            assert_eq!(sample.delta_per_minute, sample.breakdown.total() / 5.0);
            assert_eq!(sample.trend, classify(sample.delta_per_minute).unwrap());
            assert_eq!(generator.current_trend(), sample.trend);
        }
    }

    #[test]
    fn test_overwrite_resets_state() {
        let mut generator = seeded(120.0, 10);
        generator.overwrite(500.0, Trend::DoubleUp);
        assert_eq!(generator.current_value(), 400.0);
        assert_eq!(generator.current_trend(), Trend::DoubleUp);
    }

    #[test]
    fn test_negative_iob_rejected() {
        let mut generator = seeded(120.0, 11);
        assert!(generator.step(at_hour(9), false, -1.0).is_err());
    }
}
