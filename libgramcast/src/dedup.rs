//! Duplicate-message suppression with a sliding time window
//!
//! Process-wide cache keyed by sender: a value seen for the same key within
//! the window counts as a duplicate. Entries are evicted lazily on access
//! and explicitly via `purge_expired`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

struct Entry {
    value: String,
    seen_at: Instant,
}

pub struct DedupCache {
    window: Duration,
    entries: Mutex<HashMap<String, Vec<Entry>>>,
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl DedupCache {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Whether the value was already seen for this key within the window
    pub fn check(&self, key: &str, value: &str) -> bool {
        let mut entries = self.entries.lock().unwrap();
        let Some(seen) = entries.get_mut(key) else {
            return false;
        };
        let now = Instant::now();
        seen.retain(|entry| now.duration_since(entry.seen_at) < self.window);
        seen.iter().any(|entry| entry.value == value)
    }

    /// Record a value as seen for this key
    pub fn record(&self, key: &str, value: &str) {
        let mut entries = self.entries.lock().unwrap();
        entries.entry(key.to_string()).or_default().push(Entry {
            value: value.to_string(),
            seen_at: Instant::now(),
        });
    }

    /// Check and, if new, record in one step.
    ///
    /// Returns true if the value is a duplicate within the window.
    pub fn check_and_record(&self, key: &str, value: &str) -> bool {
        let mut entries = self.entries.lock().unwrap();
        let now = Instant::now();
        let seen = entries.entry(key.to_string()).or_default();
        seen.retain(|entry| now.duration_since(entry.seen_at) < self.window);

        if seen.iter().any(|entry| entry.value == value) {
            return true;
        }
        seen.push(Entry {
            value: value.to_string(),
            seen_at: now,
        });
        false
    }

    /// Drop every expired entry and empty keys
    pub fn purge_expired(&self) {
        let mut entries = self.entries.lock().unwrap();
        let now = Instant::now();
        entries.retain(|_, seen| {
            seen.retain(|entry| now.duration_since(entry.seen_at) < self.window);
            !seen.is_empty()
        });
    }

    /// Number of keys currently tracked
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}
