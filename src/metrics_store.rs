// ABOUTME: Process-wide holder of the current canonical record and its bounded history
// ABOUTME: Orders inserts by timestamp, notifies subscribers, and mirrors to a local file
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Metrics Store
//!
//! Injected into every consumer rather than reached through a global. Poll
//! ticks and remote echoes can land out of order, so the history is kept
//! sorted by timestamp and `current()` is always the latest record, not the
//! most recently received one. A record whose timestamp is already present
//! replaces the old entry, which makes re-applying a record harmless.
//!
//! Clearing the store also fences off remote records stamped before the
//! clear, so an echo of a push made just before a disconnect cannot
//! repopulate it.

use chrono::{DateTime, Utc};
use pulse_core::constants::sync::HISTORY_CAPACITY;
use pulse_core::errors::{AppError, AppResult};
use pulse_core::models::CanonicalMetricsRecord;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, warn};

#[derive(Debug)]
struct StoreState {
    current: CanonicalMetricsRecord,
    history: VecDeque<CanonicalMetricsRecord>,
    cleared_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct MirrorSnapshot {
    current: CanonicalMetricsRecord,
    history: Vec<CanonicalMetricsRecord>,
}

/// Latest record plus a rolling, time-ascending history
#[derive(Debug)]
pub struct MetricsStore {
    state: Mutex<StoreState>,
    capacity: usize,
    updates: watch::Sender<CanonicalMetricsRecord>,
    mirror_path: Option<PathBuf>,
}

impl Default for MetricsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsStore {
    /// Empty store with the default history capacity
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    /// Empty store keeping at most `capacity` records
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (updates, _) = watch::channel(CanonicalMetricsRecord::no_data());
        Self {
            state: Mutex::new(StoreState {
                current: CanonicalMetricsRecord::no_data(),
                history: VecDeque::with_capacity(capacity + 1),
                cleared_at: None,
            }),
            capacity: capacity.max(1),
            updates,
            mirror_path: None,
        }
    }

    /// Store mirrored to `path`, restoring whatever the file already holds
    ///
    /// # Errors
    ///
    /// Returns a storage error if the file exists but cannot be read or decoded.
    pub fn with_mirror(capacity: usize, path: impl Into<PathBuf>) -> AppResult<Self> {
        let mut store = Self::with_capacity(capacity);
        let path = path.into();
        if let Some(snapshot) = read_mirror(&path)? {
            let mut state = store.lock();
            for record in snapshot.history {
                insert_ordered(&mut state.history, record, store.capacity);
            }
            state.current = state
                .history
                .back()
                .cloned()
                .unwrap_or(snapshot.current);
            store.updates.send_replace(state.current.clone());
            debug!(
                path = %path.display(),
                records = state.history.len(),
                "Restored metrics mirror"
            );
        }
        store.mirror_path = Some(path);
        Ok(store)
    }

    /// Last known record, or the no-data sentinel
    #[must_use]
    pub fn current(&self) -> CanonicalMetricsRecord {
        self.lock().current.clone()
    }

    /// History snapshot, ascending by timestamp
    #[must_use]
    pub fn history(&self) -> Vec<CanonicalMetricsRecord> {
        self.lock().history.iter().cloned().collect()
    }

    /// Maximum number of records kept
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Receiver that observes every change of `current()`
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CanonicalMetricsRecord> {
        self.updates.subscribe()
    }

    /// Stamp `last_updated` and insert a locally produced record
    ///
    /// Returns the stamped record.
    pub fn append(&self, mut record: CanonicalMetricsRecord) -> CanonicalMetricsRecord {
        record.last_updated = Utc::now();
        let stamped = record.clone();
        self.apply(|state, capacity| {
            insert_ordered(&mut state.history, record, capacity);
            true
        });
        stamped
    }

    /// Apply a record received from the remote store without restamping it
    ///
    /// Returns `false` when an entry with the same timestamp is at least as
    /// recent, which is how echoes of our own writes are absorbed, or when
    /// the record was stamped before the last `clear()`.
    pub fn merge_remote(&self, record: CanonicalMetricsRecord) -> bool {
        self.apply(|state, capacity| {
            if state.cleared_at.is_some_and(|at| record.last_updated <= at) {
                debug!(timestamp = %record.timestamp, "Ignoring remote record from before the last clear");
                return false;
            }
            let existing = state.history.iter().find(|r| r.timestamp == record.timestamp);
            if existing.is_some_and(|r| !record.is_newer_than(r)) {
                return false;
            }
            insert_ordered(&mut state.history, record, capacity);
            true
        })
    }

    /// Reset to the sentinel and empty the history
    pub fn clear(&self) {
        {
            let mut state = self.lock();
            state.current = CanonicalMetricsRecord::no_data();
            state.history.clear();
            state.cleared_at = Some(Utc::now());
        }
        self.updates.send_replace(CanonicalMetricsRecord::no_data());
        self.persist();
    }

    fn apply(
        &self,
        mutate: impl FnOnce(&mut StoreState, usize) -> bool,
    ) -> bool {
        let current = {
            let mut state = self.lock();
            if !mutate(&mut state, self.capacity) {
                return false;
            }
            if let Some(latest) = state.history.back().cloned() {
                state.current = latest;
            }
            state.current.clone()
        };
        self.updates.send_if_modified(|shown| {
            if *shown == current {
                false
            } else {
                *shown = current;
                true
            }
        });
        self.persist();
        true
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self) {
        let Some(path) = &self.mirror_path else {
            return;
        };
        let snapshot = {
            let state = self.lock();
            MirrorSnapshot {
                current: state.current.clone(),
                history: state.history.iter().cloned().collect(),
            }
        };
        if let Err(e) = write_mirror(path, &snapshot) {
            warn!(path = %path.display(), error = %e, "Failed to write metrics mirror");
        }
    }
}

fn insert_ordered(
    history: &mut VecDeque<CanonicalMetricsRecord>,
    record: CanonicalMetricsRecord,
    capacity: usize,
) {
    match history.binary_search_by(|probe| probe.timestamp.cmp(&record.timestamp)) {
        Ok(index) => history[index] = record,
        Err(index) => history.insert(index, record),
    }
    while history.len() > capacity {
        history.pop_front();
    }
}

fn read_mirror(path: &Path) -> AppResult<Option<MirrorSnapshot>> {
    match fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            AppError::storage(format!("metrics mirror {} is corrupt: {e}", path.display()))
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AppError::storage(format!(
            "failed to read metrics mirror {}: {e}",
            path.display()
        ))),
    }
}

fn write_mirror(path: &Path, snapshot: &MirrorSnapshot) -> AppResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::storage(format!("failed to create {}: {e}", parent.display())))?;
    }
    let bytes = serde_json::to_vec(snapshot)?;
    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, bytes)
        .map_err(|e| AppError::storage(format!("failed to write {}: {e}", temp_path.display())))?;
    fs::rename(&temp_path, path)
        .map_err(|e| AppError::storage(format!("failed to replace {}: {e}", path.display())))
}
