//! Monitoring pipeline: store append, alert evaluation, notification.
//!
//! Both synthetic cycles and manual entries go through [`Monitor`], so every
//! new reading is evaluated and (when it alerts) handed to the dispatcher
//! exactly once.

use crate::alert::{evaluate, projection_note};
use crate::error::ensure_non_negative;
use crate::generator::{round_bgl, ReadingGenerator};
use crate::insulin::{compute_iob, ACTIVE_WINDOW};
use crate::journal::EventSink;
use crate::notify::Dispatcher;
use crate::profile::ProfileProvider;
use crate::stats::{summarize_at, Summary};
use crate::{
    AlertNotice, AlertVerdict, Error, Event, EventStore, GlucoseReading, MealEvent, MedicationDose,
    Result, Trend, MAX_BGL, MIN_BGL,
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// A reading entered by hand
#[derive(Clone, Debug, PartialEq)]
pub struct ManualReading {
    pub timestamp: DateTime<Utc>,
    /// mg/dL; must be within [`MIN_BGL`, `MAX_BGL`]
    pub value: f64,
    /// Caller-chosen trend, bypassing classification
    pub trend: Trend,
    /// IOB as reported by the caller; computed from dose history when None
    pub insulin_on_board: Option<f64>,
    pub note: Option<String>,
}

/// What one pass through the pipeline produced
#[derive(Clone, Debug, PartialEq)]
pub struct CycleOutcome {
    pub reading: GlucoseReading,
    pub verdict: AlertVerdict,
}

pub struct Monitor {
    store: Arc<EventStore>,
    profile: Arc<dyn ProfileProvider>,
    dispatcher: Dispatcher,
    journal: Option<Arc<dyn EventSink>>,
}

impl Monitor {
    pub fn new(store: Arc<EventStore>, profile: Arc<dyn ProfileProvider>, dispatcher: Dispatcher) -> Self {
        Self {
            store,
            profile,
            dispatcher,
            journal: None,
        }
    }

    /// Also write every accepted event to `journal`
    pub fn with_journal(mut self, journal: Arc<dyn EventSink>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Live insulin-on-board at `now`
    pub fn current_iob(&self, now: DateTime<Utc>) -> Result<f64> {
        let doses = self.store.doses_since(now - ACTIVE_WINDOW);
        compute_iob(now, &doses)
    }

    /// Run one synthetic generation cycle at `now`
    pub fn run_cycle(&self, generator: &mut ReadingGenerator, now: DateTime<Utc>) -> Result<CycleOutcome> {
        let iob = self.current_iob(now)?;
        // Meals stamped after `now` have not happened yet from this cycle's view
        let meal_within_hour = self
            .store
            .meals_since(now - Duration::hours(1))
            .iter()
            .any(|m| m.timestamp <= now);

        let sample = generator.step(now, meal_within_hour, iob)?;
        tracing::debug!(
            value = sample.value,
            trend = %sample.trend,
            delta_per_minute = sample.delta_per_minute,
            "Generated reading"
        );

        let reading = GlucoseReading::new(now, sample.value, sample.trend, iob);
        self.accept_reading(reading)
    }

    /// Record a manual reading
    ///
    /// Rejected before the store is touched if the value or IOB is out of
    /// domain.
    pub fn log_manual_reading(&self, entry: ManualReading) -> Result<CycleOutcome> {
        let value = entry.value;
        if !value.is_finite() || value < f64::from(MIN_BGL) || value > f64::from(MAX_BGL) {
            return Err(Error::InvalidInput(format!(
                "reading must be within [{}, {}] mg/dL, got {}",
                MIN_BGL, MAX_BGL, value
            )));
        }
        let iob = match entry.insulin_on_board {
            Some(iob) => ensure_non_negative("insulin on board", iob)?,
            None => self.current_iob(entry.timestamp)?,
        };

        let mut reading = GlucoseReading::new(entry.timestamp, round_bgl(value), entry.trend, iob);
        reading.note = entry.note;
        tracing::info!(value = reading.value, trend = %reading.trend, "Manual reading entered");
        self.accept_reading(reading)
    }

    /// Record a meal
    pub fn log_meal(&self, meal: MealEvent) -> Result<()> {
        if meal.description.trim().is_empty() {
            return Err(Error::InvalidInput("meal description is empty".into()));
        }
        if let Some(macros) = meal.macros {
            ensure_non_negative("carbs", macros.carbs)?;
            ensure_non_negative("protein", macros.protein)?;
            ensure_non_negative("fat", macros.fat)?;
        }
        self.record(Event::from(meal));
        Ok(())
    }

    /// Record a dose; units must be positive
    pub fn log_dose(&self, dose: MedicationDose) -> Result<()> {
        let units = ensure_non_negative("dose units", dose.units)?;
        if units == 0.0 {
            return Err(Error::InvalidInput("dose units must be positive".into()));
        }
        self.record(Event::from(dose));
        Ok(())
    }

    /// Summary over `window` ending at `now`
    pub fn summarize(&self, window: Duration, now: DateTime<Utc>) -> Summary {
        summarize_at(&self.store, window, now)
    }

    fn accept_reading(&self, reading: GlucoseReading) -> Result<CycleOutcome> {
        let verdict = self.evaluate(&reading)?;
        self.record(Event::from(reading.clone()));

        if verdict.alert {
            tracing::info!(severity = %verdict.severity, bgl = reading.value, "Alert raised");
            self.dispatcher.dispatch(AlertNotice {
                timestamp: reading.timestamp,
                severity: verdict.severity,
                bgl: reading.value,
                trend: reading.trend,
                rationale: verdict.rationale.clone(),
            });
        }

        Ok(CycleOutcome { reading, verdict })
    }

    fn evaluate(&self, reading: &GlucoseReading) -> Result<AlertVerdict> {
        let bgl = f64::from(reading.value);
        let mut verdict = evaluate(bgl, reading.trend, reading.insulin_on_board)?;
        if verdict.alert {
            if let Some(note) = projection_note(bgl, reading.insulin_on_board, &self.profile.profile()) {
                verdict.rationale.push(' ');
                verdict.rationale.push_str(&note);
            }
        }
        Ok(verdict)
    }

    /// Journal, then append to the store; journal failures are logged only
    fn record(&self, event: Event) {
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.append(&event) {
                tracing::warn!("Failed to journal {:?} event {}: {}", event.kind(), event.id(), e);
            }
        }
        self.store.append(event);
    }
}
