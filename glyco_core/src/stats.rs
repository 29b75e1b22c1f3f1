//! Sliding-window summary statistics.
//!
//! Everything is recomputed from a store snapshot on each call; there is no
//! cached state, so repeated calls over the same contents agree exactly.

use crate::{EventStore, GlucoseReading, MealEvent, MedicationDose};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lower inclusive bound of the target range (mg/dL)
pub const RANGE_LOW: u16 = 70;
/// Upper inclusive bound of the target range (mg/dL)
pub const RANGE_HIGH: u16 = 180;
/// Readings strictly above this count as hyper events.
///
/// Stricter than [`RANGE_HIGH`]; "above range" and "hyper event" are
/// separate metrics.
pub const HYPER_EVENT: u16 = 250;

/// Summary over a lookback window
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Mean BGL, rounded half-up to an integer
    pub avg_bgl: u32,
    pub time_in_range_pct: u32,
    pub time_above_pct: u32,
    pub time_below_pct: u32,
    pub hypo_event_count: usize,
    pub hyper_event_count: usize,
    pub reading_count: usize,
    pub avg_carbs_per_meal: f64,
    pub total_insulin_units: f64,
}

/// Summarize the store contents within `window` of the wall clock
pub fn summarize(store: &EventStore, window: Duration) -> Summary {
    summarize_at(store, window, Utc::now())
}

/// Summarize the store contents within `window` of `now`
pub fn summarize_at(store: &EventStore, window: Duration, now: DateTime<Utc>) -> Summary {
    let cutoff = now - window;
    summarize_events(
        &store.readings_since(cutoff),
        &store.meals_since(cutoff),
        &store.doses_since(cutoff),
    )
}

/// Summary of already-filtered event slices
pub fn summarize_events(
    readings: &[GlucoseReading],
    meals: &[MealEvent],
    doses: &[MedicationDose],
) -> Summary {
    let total = readings.len();

    let mut in_range = 0;
    let mut above = 0;
    let mut below = 0;
    let mut hyper = 0;
    let mut sum: u64 = 0;

    for reading in readings {
        let v = reading.value;
        sum += u64::from(v);
        if v < RANGE_LOW {
            below += 1;
        } else if v > RANGE_HIGH {
            above += 1;
        } else {
            in_range += 1;
        }
        if v > HYPER_EVENT {
            hyper += 1;
        }
    }

    let total_carbs: f64 = meals.iter().map(MealEvent::carbs).sum();
    let avg_carbs_per_meal = if meals.is_empty() {
        0.0
    } else {
        total_carbs / meals.len() as f64
    };

    Summary {
        avg_bgl: round_half_up_div(sum, total as u64) as u32,
        time_in_range_pct: percent(in_range, total),
        time_above_pct: percent(above, total),
        time_below_pct: percent(below, total),
        // Every reading below range is a hypo event
        hypo_event_count: below,
        hyper_event_count: hyper,
        reading_count: total,
        avg_carbs_per_meal,
        total_insulin_units: doses.iter().map(|d| d.units).sum(),
    }
}

/// `round(count / total * 100)`, half-up, 0 when there is no data
fn percent(count: usize, total: usize) -> u32 {
    round_half_up_div(count as u64 * 100, total as u64) as u32
}

/// Integer division rounding half-up; 0 for a zero divisor
fn round_half_up_div(numerator: u64, denominator: u64) -> u64 {
    if denominator == 0 {
        return 0;
    }
    (numerator * 2 + denominator) / (denominator * 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DoseKind, Macros, StoreConfig, Trend};

    fn store_with_values(now: DateTime<Utc>, values: &[u16]) -> EventStore {
        let store = EventStore::new(&StoreConfig::default());
        for (i, v) in values.iter().enumerate() {
            let ts = now - Duration::hours(i as i64 + 1);
            store.append(GlucoseReading::new(ts, *v, Trend::Steady, 0.0));
        }
        store
    }

    #[test]
    fn test_empty_window_is_all_zero() {
        let store = EventStore::default();
        let summary = summarize_at(&store, Duration::days(7), Utc::now());
        assert_eq!(summary, Summary::default());
        assert_eq!(summary.avg_carbs_per_meal, 0.0);
    }

    #[test]
    fn test_week_of_mixed_readings() {
        let now = Utc::now();
        let store = store_with_values(now, &[70, 100, 100, 190, 300]);

        let s = summarize_at(&store, Duration::days(7), now);
        assert_eq!(s.reading_count, 5);
        // 70 sits on the inclusive lower bound
        assert_eq!(s.time_in_range_pct, 60);
        assert_eq!(s.time_below_pct, 0);
        assert_eq!(s.time_above_pct, 40);
        assert_eq!(s.hypo_event_count, 0);
        assert_eq!(s.hyper_event_count, 1);
        assert_eq!(s.avg_bgl, 152);
    }

    #[test]
    fn test_hyper_threshold_is_stricter_than_above_range() {
        let now = Utc::now();
        let store = store_with_values(now, &[200, 250, 251]);
        let s = summarize_at(&store, Duration::days(1), now);
        assert_eq!(s.time_above_pct, 100);
        assert_eq!(s.hyper_event_count, 1);
    }

    #[test]
    fn test_percentages_round_half_up() {
        let now = Utc::now();
        // 1 of 8 below = 12.5% -> 13; 7 of 8 in range = 87.5% -> 88
        let store = store_with_values(now, &[60, 100, 100, 100, 100, 100, 100, 100]);
        let s = summarize_at(&store, Duration::days(1), now);
        assert_eq!(s.time_below_pct, 13);
        assert_eq!(s.time_in_range_pct, 88);
        assert_eq!(s.hypo_event_count, 1);
    }

    #[test]
    fn test_window_excludes_old_events() {
        let now = Utc::now();
        let store = store_with_values(now, &[100, 100, 300]);
        // Only the first two readings are within 2h30m
        let s = summarize_at(&store, Duration::minutes(150), now);
        assert_eq!(s.reading_count, 2);
        assert_eq!(s.hyper_event_count, 0);
    }

    #[test]
    fn test_meals_and_doses() {
        let now = Utc::now();
        let store = EventStore::default();
        store.append(MealEvent::new(now - Duration::hours(1), "pasta").with_macros(Macros {
            carbs: 60.0,
            protein: 15.0,
            fat: 10.0,
        }));
        store.append(MealEvent::new(now - Duration::hours(2), "salad"));
        store.append(MedicationDose::new(now - Duration::hours(1), DoseKind::Bolus, 4.0));
        store.append(MedicationDose::new(now - Duration::hours(3), DoseKind::Basal, 18.0));
        store.append(MedicationDose::new(now - Duration::days(3), DoseKind::Bolus, 9.0));

        let s = summarize_at(&store, Duration::days(1), now);
        assert_eq!(s.avg_carbs_per_meal, 30.0);
        assert_eq!(s.total_insulin_units, 22.0);
        assert_eq!(s.reading_count, 0);
        assert_eq!(s.avg_bgl, 0);
    }

    #[test]
    fn test_repeated_calls_are_identical() {
        let now = Utc::now();
        let store = store_with_values(now, &[65, 110, 185, 260]);
        let first = summarize_at(&store, Duration::days(1), now);
        let second = summarize_at(&store, Duration::days(1), now);
        assert_eq!(first, second);
    }
}
