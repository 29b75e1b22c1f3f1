//! Periodic driver for the reading generator.
//!
//! The scheduler owns one patient's [`ReadingGenerator`] and a ticker task.
//! `start` runs one cycle immediately and then spawns the ticker; `stop`
//! flips the task's cancellation channel while holding the generator lock, so
//! once `stop` returns no new cycle can begin. A cycle already in flight
//! finishes its single append before `stop` gets the lock.

use crate::generator::ReadingGenerator;
use crate::monitor::{CycleOutcome, ManualReading, Monitor};
use crate::Result;
use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

struct Running {
    cancel: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct Scheduler {
    monitor: Arc<Monitor>,
    generator: Arc<Mutex<ReadingGenerator>>,
    period: Duration,
    running: Mutex<Option<Running>>,
}

impl Scheduler {
    pub fn new(monitor: Arc<Monitor>, generator: ReadingGenerator) -> Self {
        let period = Duration::from_secs(u64::from(generator.interval_minutes()) * 60);
        Self::with_period(monitor, generator, period)
    }

    /// Tick at `period` instead of the generator's nominal interval
    pub fn with_period(monitor: Arc<Monitor>, generator: ReadingGenerator, period: Duration) -> Self {
        Self {
            monitor,
            generator: Arc::new(Mutex::new(generator)),
            period,
            running: Mutex::new(None),
        }
    }

    pub fn monitor(&self) -> &Arc<Monitor> {
        &self.monitor
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Start generating; a no-op returning false if already running
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> bool {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            tracing::debug!("Scheduler already running");
            return false;
        }

        {
            let mut generator = self.generator.lock().unwrap_or_else(PoisonError::into_inner);
            run_logged(&self.monitor, &mut generator);
        }

        let (cancel, cancelled) = watch::channel(false);
        let handle = tokio::spawn(tick_loop(
            Arc::clone(&self.monitor),
            Arc::clone(&self.generator),
            self.period,
            cancelled,
        ));
        *running = Some(Running { cancel, handle });

        tracing::info!("Reading generator started (every {:?})", self.period);
        true
    }

    /// Stop generating; a no-op returning false if already stopped
    pub fn stop(&self) -> bool {
        let Some(running) = self.running.lock().unwrap_or_else(PoisonError::into_inner).take() else {
            return false;
        };

        {
            let _generator = self.generator.lock().unwrap_or_else(PoisonError::into_inner);
            // Receiver gone means the task already exited
            let _ = running.cancel.send(true);
        }

        tracing::info!("Reading generator stopped");
        true
    }

    /// Stop and wait for the ticker task to exit
    pub async fn shutdown(&self) {
        let running = self.running.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(running) = running {
            {
                let _generator = self.generator.lock().unwrap_or_else(PoisonError::into_inner);
                let _ = running.cancel.send(true);
            }
            if let Err(e) = running.handle.await {
                tracing::warn!("Generator task ended abnormally: {}", e);
            }
            tracing::info!("Reading generator shut down");
        }
    }

    /// Record a manual reading and sync the generator to it
    pub fn log_manual_reading(&self, entry: ManualReading) -> Result<CycleOutcome> {
        let mut generator = self.generator.lock().unwrap_or_else(PoisonError::into_inner);
        let value = entry.value;
        let outcome = self.monitor.log_manual_reading(entry)?;
        generator.overwrite(value, outcome.reading.trend);
        Ok(outcome)
    }

    /// Current simulated value and trend
    pub fn generator_state(&self) -> (f64, crate::Trend) {
        let generator = self.generator.lock().unwrap_or_else(PoisonError::into_inner);
        (generator.current_value(), generator.current_trend())
    }
}

async fn tick_loop(
    monitor: Arc<Monitor>,
    generator: Arc<Mutex<ReadingGenerator>>,
    period: Duration,
    mut cancelled: watch::Receiver<bool>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancelled.changed() => break,
        }

        let mut state = generator.lock().unwrap_or_else(PoisonError::into_inner);
        if *cancelled.borrow() {
            break;
        }
        run_logged(&monitor, &mut state);
    }

    tracing::debug!("Generator tick loop exited");
}

/// One cycle; errors are logged so the ticker keeps going
fn run_logged(monitor: &Monitor, generator: &mut ReadingGenerator) {
    match monitor.run_cycle(generator, Utc::now()) {
        Ok(outcome) => tracing::debug!(
            value = outcome.reading.value,
            trend = %outcome.reading.trend,
            "Generation cycle complete"
        ),
        Err(e) => tracing::warn!("Generation cycle failed: {}", e),
    }
}
