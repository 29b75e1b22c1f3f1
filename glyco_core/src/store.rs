//! Bounded, time-ordered, in-memory event store.
//!
//! The store owns three independent streams (readings, meals, doses). Appends
//! are serialized behind a write lock; queries take a read lock and copy out a
//! snapshot, so a reader never observes a half-applied append. Each stream has
//! its own retention bound and evicts its oldest entries first.

use crate::{Event, EventKind, GlucoseReading, MealEvent, MedicationDose, Since, StoreConfig};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock};

/// Items that can live in a [`Stream`]
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

impl Timestamped for GlucoseReading {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timestamped for MealEvent {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timestamped for MedicationDose {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// One FIFO-bounded, timestamp-ordered stream
#[derive(Debug, Clone)]
struct Stream<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T: Timestamped + Clone> Stream<T> {
    fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::new(),
            capacity,
        }
    }

    /// Insert keeping timestamp order, then evict from the front.
    ///
    /// The common case (timestamp not older than the tail) is a push_back.
    /// Equal timestamps keep insertion order.
    fn push(&mut self, item: T) -> usize {
        let ts = item.timestamp();
        match self.items.back() {
            Some(last) if last.timestamp() > ts => {
                let idx = self.items.partition_point(|e| e.timestamp() <= ts);
                self.items.insert(idx, item);
            }
            _ => self.items.push_back(item),
        }
        self.evict()
    }

    fn evict(&mut self) -> usize {
        let mut evicted = 0;
        while self.items.len() > self.capacity {
            self.items.pop_front();
            evicted += 1;
        }
        evicted
    }

    fn since(&self, cutoff: DateTime<Utc>) -> Vec<T> {
        let start = self.items.partition_point(|e| e.timestamp() < cutoff);
        self.items.range(start..).cloned().collect()
    }

    /// Replace contents with `items`, sorted (stable) and truncated to the newest N
    fn replace(&mut self, mut items: Vec<T>) -> usize {
        items.sort_by_key(|e| e.timestamp());
        let dropped = items.len().saturating_sub(self.capacity);
        self.items = items.into_iter().skip(dropped).collect();
        dropped
    }
}

#[derive(Debug)]
struct Streams {
    readings: Stream<GlucoseReading>,
    meals: Stream<MealEvent>,
    doses: Stream<MedicationDose>,
}

/// Full copy of the store contents
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub readings: Vec<GlucoseReading>,
    #[serde(default)]
    pub meals: Vec<MealEvent>,
    #[serde(default)]
    pub doses: Vec<MedicationDose>,
}

impl StoreSnapshot {
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty() && self.meals.is_empty() && self.doses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.readings.len() + self.meals.len() + self.doses.len()
    }

    /// Build a snapshot from a flat event list (e.g. a replayed journal)
    pub fn from_events(events: impl IntoIterator<Item = Event>) -> Self {
        let mut snapshot = Self::default();
        for event in events {
            snapshot.push(event);
        }
        snapshot
    }

    pub fn push(&mut self, event: Event) {
        match event {
            Event::Reading(r) => self.readings.push(r),
            Event::Meal(m) => self.meals.push(m),
            Event::Dose(d) => self.doses.push(d),
        }
    }
}

/// Thread-safe event store
#[derive(Debug)]
pub struct EventStore {
    streams: RwLock<Streams>,
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new(&StoreConfig::default())
    }
}

impl EventStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            streams: RwLock::new(Streams {
                readings: Stream::new(config.max_readings),
                meals: Stream::new(config.max_meals),
                doses: Stream::new(config.max_doses),
            }),
        }
    }

    /// Append an event to its stream, evicting the oldest entry at capacity
    pub fn append(&self, event: impl Into<Event>) {
        let event = event.into();
        let kind = event.kind();
        let id = event.id();

        let evicted = {
            let mut streams = self.streams.write().unwrap_or_else(PoisonError::into_inner);
            match event {
                Event::Reading(r) => streams.readings.push(r),
                Event::Meal(m) => streams.meals.push(m),
                Event::Dose(d) => streams.doses.push(d),
            }
        };

        tracing::debug!("Appended {:?} event {}", kind, id);
        if evicted > 0 {
            tracing::debug!("Evicted {} oldest {:?} events", evicted, kind);
        }
    }

    /// Events of `kind` at or after `since`, oldest first, relative to the wall clock
    pub fn query(&self, kind: EventKind, since: impl Into<Since>) -> Vec<Event> {
        self.query_at(kind, since, Utc::now())
    }

    /// Same as [`EventStore::query`] with an explicit `now`
    pub fn query_at(&self, kind: EventKind, since: impl Into<Since>, now: DateTime<Utc>) -> Vec<Event> {
        let cutoff = since.into().cutoff(now);
        match kind {
            EventKind::Reading => self.readings_since(cutoff).into_iter().map(Event::from).collect(),
            EventKind::Meal => self.meals_since(cutoff).into_iter().map(Event::from).collect(),
            EventKind::Dose => self.doses_since(cutoff).into_iter().map(Event::from).collect(),
        }
    }

    /// Most recent event of `kind`
    pub fn latest(&self, kind: EventKind) -> Option<Event> {
        match kind {
            EventKind::Reading => self.latest_reading().map(Event::from),
            EventKind::Meal => self.latest_meal().map(Event::from),
            EventKind::Dose => self.latest_dose().map(Event::from),
        }
    }

    pub fn readings_since(&self, cutoff: DateTime<Utc>) -> Vec<GlucoseReading> {
        self.read(|s| s.readings.since(cutoff))
    }

    pub fn meals_since(&self, cutoff: DateTime<Utc>) -> Vec<MealEvent> {
        self.read(|s| s.meals.since(cutoff))
    }

    pub fn doses_since(&self, cutoff: DateTime<Utc>) -> Vec<MedicationDose> {
        self.read(|s| s.doses.since(cutoff))
    }

    pub fn latest_reading(&self) -> Option<GlucoseReading> {
        self.read(|s| s.readings.items.back().cloned())
    }

    /// Most recent reading stamped at or before `at`
    pub fn latest_reading_at(&self, at: DateTime<Utc>) -> Option<GlucoseReading> {
        self.read(|s| {
            let end = s.readings.items.partition_point(|r| r.timestamp <= at);
            end.checked_sub(1).and_then(|i| s.readings.items.get(i).cloned())
        })
    }

    pub fn latest_meal(&self) -> Option<MealEvent> {
        self.read(|s| s.meals.items.back().cloned())
    }

    pub fn latest_dose(&self) -> Option<MedicationDose> {
        self.read(|s| s.doses.items.back().cloned())
    }

    /// Number of events currently held for `kind`
    pub fn len(&self, kind: EventKind) -> usize {
        self.read(|s| match kind {
            EventKind::Reading => s.readings.items.len(),
            EventKind::Meal => s.meals.items.len(),
            EventKind::Dose => s.doses.items.len(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.read(|s| s.readings.items.is_empty() && s.meals.items.is_empty() && s.doses.items.is_empty())
    }

    /// Drop every event in every stream
    pub fn clear(&self) {
        let mut streams = self.streams.write().unwrap_or_else(PoisonError::into_inner);
        streams.readings.items.clear();
        streams.meals.items.clear();
        streams.doses.items.clear();
        tracing::info!("Cleared event store");
    }

    /// Consistent copy of all three streams
    pub fn snapshot(&self) -> StoreSnapshot {
        self.read(|s| StoreSnapshot {
            readings: s.readings.items.iter().cloned().collect(),
            meals: s.meals.items.iter().cloned().collect(),
            doses: s.doses.items.iter().cloned().collect(),
        })
    }

    /// Replace the store contents with `snapshot`, reapplying retention bounds
    ///
    /// Each stream is sorted by timestamp (stable for ties) and only the newest
    /// N entries are kept.
    pub fn restore(&self, snapshot: StoreSnapshot) {
        let mut streams = self.streams.write().unwrap_or_else(PoisonError::into_inner);
        let dropped = streams.readings.replace(snapshot.readings)
            + streams.meals.replace(snapshot.meals)
            + streams.doses.replace(snapshot.doses);

        tracing::info!(
            "Restored {} readings, {} meals, {} doses ({} truncated by retention)",
            streams.readings.items.len(),
            streams.meals.items.len(),
            streams.doses.items.len(),
            dropped
        );
    }

    fn read<R>(&self, f: impl FnOnce(&Streams) -> R) -> R {
        let streams = self.streams.read().unwrap_or_else(PoisonError::into_inner);
        f(&streams)
    }
}
