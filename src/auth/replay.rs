//! Replay-protection cache.
//!
//! Remembers which (resolved callsign, code) pairs have already been
//! consumed. Entries expire after a configured max-age and the cache is
//! bounded; when full, the oldest entry is evicted first. A pair that is
//! presented again while still inside the max-age window is a duplicate,
//! even though the six-digit space recurs across time steps.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Cache key: (resolved callsign, code digits).
pub type ReplayKey = (String, String);

/// Thread-safe, time- and size-bounded replay cache.
pub struct ReplayCache {
    /// Map of key -> insertion time.
    entries: Mutex<HashMap<ReplayKey, Instant>>,
    /// Age past which an entry is treated as absent.
    max_age: Duration,
    /// Hard cap on stored entries.
    max_entries: usize,
}

impl ReplayCache {
    /// Create a new replay cache.
    pub fn new(max_age: Duration, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_age,
            max_entries: max_entries.max(1),
        }
    }

    /// Whether the pair has already been consumed within the max-age window.
    ///
    /// Checked before a command is rendered; the authoritative decision is
    /// [`record`](Self::record), which is a check-and-set.
    pub fn seen(&self, key: &ReplayKey) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        entries.retain(|_, inserted| now.duration_since(*inserted) <= self.max_age);
        entries.contains_key(key)
    }

    /// Record a consumed pair.
    ///
    /// Returns `true` if the pair was newly inserted, `false` if it was
    /// already present. Two in-flight duplicates may both pass
    /// [`seen`](Self::seen); exactly one of them wins this check-and-set.
    pub fn record(&self, key: &ReplayKey) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        entries.retain(|_, inserted| now.duration_since(*inserted) <= self.max_age);

        if entries.contains_key(key) {
            return false;
        }

        // At capacity: evict the oldest entry first.
        if entries.len() >= self.max_entries {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, inserted)| **inserted)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest);
            }
        }

        entries.insert(key.clone(), now);
        true
    }

    /// Current number of stored entries (for monitoring).
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired entries.
    pub fn cleanup(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        entries.retain(|_, inserted| now.duration_since(*inserted) <= self.max_age);
    }

    /// Start a background task that periodically drops expired entries.
    pub fn start_cleanup_task(self: &Arc<Self>, interval: Duration) {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);
            loop {
                interval_timer.tick().await;
                cache.cleanup();
            }
        });
    }
}
