#![forbid(unsafe_code)]

//! Core domain model and monitoring logic for Glyco.
//!
//! This crate provides:
//! - Domain types (readings, meals, doses, trends)
//! - A bounded, thread-safe event store
//! - Insulin-on-board estimation, trend classification and alerting
//! - A simulated reading generator and its periodic scheduler
//! - Sliding-window statistics
//! - Persistence (journal, snapshot, CSV export)

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod profile;
pub mod store;
pub mod insulin;
pub mod trend;
pub mod alert;
pub mod stats;
pub mod notify;
pub mod generator;
pub mod journal;
pub mod snapshot;
pub mod export;
pub mod monitor;
pub mod scheduler;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::{Config, GeneratorConfig, StoreConfig};
pub use profile::{PatientProfile, ProfileProvider};
pub use store::{EventStore, StoreSnapshot};
pub use insulin::compute_iob;
pub use alert::{evaluate, AlertNotice, AlertVerdict, Condition, Severity};
pub use stats::{summarize, Summary};
pub use notify::{Dispatcher, LogSink, NotificationSink};
pub use generator::ReadingGenerator;
pub use journal::{EventSink, JsonlJournal};
pub use monitor::{CycleOutcome, ManualReading, Monitor};
pub use scheduler::Scheduler;
