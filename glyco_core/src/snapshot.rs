//! Snapshot persistence with file locking.
//!
//! A snapshot is the full store contents serialized as one JSON document.
//! Together with the journal it forms the persistence boundary: restoring
//! loads the snapshot, replays the journal on top, and reapplies the
//! retention bounds.

use crate::journal::{archive_journal, read_journal};
use crate::{Error, EventStore, Result, StoreConfig, StoreSnapshot};
use fs2::FileExt;
use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use uuid::Uuid;

impl StoreSnapshot {
    /// Load a snapshot from a file with shared locking
    ///
    /// Returns an empty snapshot if the file doesn't exist. A file that
    /// exists but cannot be parsed is an error: silently starting from an
    /// empty history would drop recorded data.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No snapshot found at {:?}, starting empty", path);
            return Ok(Self::default());
        }

        let file = File::open(path)?;
        file.lock_shared()?;

        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        file.unlock()?;
        read?;

        let snapshot: StoreSnapshot = serde_json::from_str(&contents).map_err(|e| {
            Error::Persistence(format!("corrupt snapshot {}: {}", path.display(), e))
        })?;

        tracing::debug!("Loaded {} events from snapshot {:?}", snapshot.len(), path);
        Ok(snapshot)
    }

    /// Save a snapshot to a file with exclusive locking
    ///
    /// Atomically writes by:
    /// 1. Writing to a temp file
    /// 2. Syncing to disk
    /// 3. Renaming over the original
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| Error::Persistence("snapshot path missing parent".into()))?;
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(self)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved {} events to snapshot {:?}", self.len(), path);
        Ok(())
    }
}

/// Rebuild a store from a snapshot plus any journal written after it
///
/// Journal events already present in the snapshot (same id) are skipped.
pub fn load_store(snapshot_path: &Path, journal_path: &Path, config: &StoreConfig) -> Result<EventStore> {
    let mut snapshot = StoreSnapshot::load(snapshot_path)?;
    let mut seen_ids: HashSet<Uuid> = snapshot
        .readings
        .iter()
        .map(|r| r.id)
        .chain(snapshot.meals.iter().map(|m| m.id))
        .chain(snapshot.doses.iter().map(|d| d.id))
        .collect();

    let mut replayed = 0;
    for event in read_journal(journal_path)? {
        if seen_ids.insert(event.id()) {
            snapshot.push(event);
            replayed += 1;
        }
    }
    tracing::debug!("Replayed {} journal events", replayed);

    let store = EventStore::new(config);
    store.restore(snapshot);
    Ok(store)
}

/// Fold the journal into the snapshot and archive the journal
///
/// The snapshot is fsynced before the journal is renamed; a crash in
/// between leaves events in both, which [`load_store`] deduplicates.
/// Returns the number of events in the new snapshot.
pub fn compact(snapshot_path: &Path, journal_path: &Path, config: &StoreConfig) -> Result<usize> {
    let store = load_store(snapshot_path, journal_path, config)?;
    let snapshot = store.snapshot();
    snapshot.save(snapshot_path)?;
    archive_journal(journal_path)?;

    tracing::info!("Compacted {} events into {:?}", snapshot.len(), snapshot_path);
    Ok(snapshot.len())
}
