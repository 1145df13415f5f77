//! Registry of in-flight requests
//!
//! Presence in the table means "owed exactly one completion". Removal is the
//! arbitration point between the worker and a timed-out handler: whoever
//! removes the entry performs the terminal transition on the cell while still
//! holding the lock, so the other path observes either a live entry or a
//! finished cell, never something in between.

use log::debug;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::cell::CompletionCell;
use super::types::{TrackingKey, VerifyOutcome};
use crate::error::VerifyError;

/// Initial capacity for the pending map
const PENDING_INITIAL_CAPACITY: usize = 256;

#[derive(Debug)]
pub struct PendingTable {
    entries: Mutex<HashMap<TrackingKey, Arc<CompletionCell>>>,
    /// Mirrors `entries.len()` for lock-free monitoring
    in_flight: AtomicUsize,
}

impl PendingTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::with_capacity(PENDING_INITIAL_CAPACITY)),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Register a request; must happen before it is enqueued
    ///
    /// Returns `false` (and leaves the table untouched) if the key is taken.
    pub fn register(&self, key: TrackingKey, cell: Arc<CompletionCell>) -> bool {
        let mut entries = self.entries.lock();
        if entries.contains_key(&key) {
            return false;
        }
        entries.insert(key, cell);
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Worker path: remove the entry and write the outcome
    ///
    /// Returns `false` if the request was already abandoned; the outcome is
    /// discarded.
    pub fn complete(&self, key: &TrackingKey, outcome: VerifyOutcome) -> bool {
        let mut entries = self.entries.lock();
        let Some(cell) = entries.remove(key) else {
            debug!("Discarding result for {key}: already abandoned");
            return false;
        };
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        cell.complete(outcome)
    }

    /// Timeout path: remove the entry and mark the cell abandoned
    ///
    /// Returns `false` if the worker already completed it. Idempotent.
    pub fn abandon(&self, key: &TrackingKey) -> bool {
        let mut entries = self.entries.lock();
        let Some(cell) = entries.remove(key) else {
            return false;
        };
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        cell.abandon()
    }

    /// Complete every remaining entry with `error`; returns how many were failed
    pub fn fail_all(&self, error: &VerifyError) -> usize {
        let mut entries = self.entries.lock();
        let mut failed = 0;
        for (_, cell) in entries.drain() {
            if cell.complete(Err(error.clone())) {
                failed += 1;
            }
        }
        self.in_flight.store(0, Ordering::Relaxed);
        failed
    }

    pub fn contains(&self, key: &TrackingKey) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Entries registered under `hash`, across all tickets
    pub fn count_for_hash(&self, hash: &crate::tracking::TrackingHash) -> usize {
        self.entries.lock().keys().filter(|k| &k.hash == hash).count()
    }

    pub fn len(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PendingTable {
    fn default() -> Self {
        Self::new()
    }
}
