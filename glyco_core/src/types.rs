//! Core domain types for the Glyco monitoring system.
//!
//! This module defines the event model shared by every component:
//! - Glucose readings with their derived trend and IOB snapshot
//! - Medication doses (basal and bolus)
//! - Meal events with optional macro breakdown
//! - The tagged `Event` wrapper used by the store, journal and snapshots

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lowest value a reading can hold after clamping (mg/dL)
pub const MIN_BGL: u16 = 40;

/// Highest value a reading can hold after clamping (mg/dL)
pub const MAX_BGL: u16 = 400;

// ============================================================================
// Trend
// ============================================================================

/// Discrete rate-of-change classification of BGL
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    #[default]
    Steady,
    Up,
    Down,
    DoubleUp,
    DoubleDown,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Steady => "steady",
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::DoubleUp => "double_up",
            Trend::DoubleDown => "double_down",
        }
    }

    /// Arrow glyph as shown on CGM receivers
    pub fn arrow(&self) -> &'static str {
        match self {
            Trend::Steady => "→",
            Trend::Up => "↑",
            Trend::Down => "↓",
            Trend::DoubleUp => "⇈",
            Trend::DoubleDown => "⇊",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Trend {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "steady" | "flat" => Ok(Trend::Steady),
            "up" => Ok(Trend::Up),
            "down" => Ok(Trend::Down),
            "double_up" => Ok(Trend::DoubleUp),
            "double_down" => Ok(Trend::DoubleDown),
            other => Err(crate::Error::InvalidInput(format!("unknown trend: {}", other))),
        }
    }
}

// ============================================================================
// Readings
// ============================================================================

/// A single glucose reading, synthetic or manually entered
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GlucoseReading {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// mg/dL, within [`MIN_BGL`, `MAX_BGL`]
    pub value: u16,
    pub trend: Trend,
    /// IOB at write time, never recomputed
    pub insulin_on_board: f64,
    pub note: Option<String>,
}

impl GlucoseReading {
    pub fn new(timestamp: DateTime<Utc>, value: u16, trend: Trend, insulin_on_board: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            value,
            trend,
            insulin_on_board,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

// ============================================================================
// Medication
// ============================================================================

/// Insulin dose category
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DoseKind {
    /// Background insulin; recorded but not part of IOB
    Basal,
    /// Fast-acting meal/correction insulin
    Bolus,
}

impl fmt::Display for DoseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DoseKind::Basal => f.write_str("basal"),
            DoseKind::Bolus => f.write_str("bolus"),
        }
    }
}

impl FromStr for DoseKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "basal" => Ok(DoseKind::Basal),
            "bolus" => Ok(DoseKind::Bolus),
            other => Err(crate::Error::InvalidInput(format!("unknown dose kind: {}", other))),
        }
    }
}

/// A recorded insulin dose
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MedicationDose {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub kind: DoseKind,
    pub units: f64,
    pub note: Option<String>,
}

impl MedicationDose {
    pub fn new(timestamp: DateTime<Utc>, kind: DoseKind, units: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            kind,
            units,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

// ============================================================================
// Meals
// ============================================================================

/// Macro breakdown of a meal in grams
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct Macros {
    pub carbs: f64,
    pub protein: f64,
    pub fat: f64,
}

/// A logged meal
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MealEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub macros: Option<Macros>,
    /// Dose taken for this meal, if any
    pub linked_dose: Option<Uuid>,
}

impl MealEvent {
    pub fn new(timestamp: DateTime<Utc>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            description: description.into(),
            macros: None,
            linked_dose: None,
        }
    }

    pub fn with_macros(mut self, macros: Macros) -> Self {
        self.macros = Some(macros);
        self
    }

    pub fn with_linked_dose(mut self, dose_id: Uuid) -> Self {
        self.linked_dose = Some(dose_id);
        self
    }

    /// Carbohydrates in grams; meals without a breakdown count as zero
    pub fn carbs(&self) -> f64 {
        self.macros.map(|m| m.carbs).unwrap_or(0.0)
    }
}

// ============================================================================
// Event envelope
// ============================================================================

/// Discriminant for the three event streams
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Reading,
    Meal,
    Dose,
}

/// Any event held by the store
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Reading(GlucoseReading),
    Meal(MealEvent),
    Dose(MedicationDose),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Reading(_) => EventKind::Reading,
            Event::Meal(_) => EventKind::Meal,
            Event::Dose(_) => EventKind::Dose,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Event::Reading(r) => r.timestamp,
            Event::Meal(m) => m.timestamp,
            Event::Dose(d) => d.timestamp,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Event::Reading(r) => r.id,
            Event::Meal(m) => m.id,
            Event::Dose(d) => d.id,
        }
    }
}

impl From<GlucoseReading> for Event {
    fn from(reading: GlucoseReading) -> Self {
        Event::Reading(reading)
    }
}

impl From<MealEvent> for Event {
    fn from(meal: MealEvent) -> Self {
        Event::Meal(meal)
    }
}

impl From<MedicationDose> for Event {
    fn from(dose: MedicationDose) -> Self {
        Event::Dose(dose)
    }
}

/// Lower bound of a store query
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Since {
    /// Lookback relative to the query's `now`
    Lookback(Duration),
    /// Absolute inclusive cutoff
    At(DateTime<Utc>),
}

impl Since {
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Since::Lookback(window) => now - *window,
            Since::At(ts) => *ts,
        }
    }
}

impl From<Duration> for Since {
    fn from(window: Duration) -> Self {
        Since::Lookback(window)
    }
}

impl From<DateTime<Utc>> for Since {
    fn from(ts: DateTime<Utc>) -> Self {
        Since::At(ts)
    }
}
