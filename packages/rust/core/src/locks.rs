//! Keyed async locks for serializing pipeline runs per document identity.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type EntryMap = Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>;

/// A registry of named async locks.
///
/// Runs that acquire the same key serialize; distinct keys do not contend.
/// An entry is removed when the last guard for its key is dropped; one left
/// behind by a waiter cancelled mid-`acquire` is swept on the next call, so
/// the map does not grow with the lifetime of the process.
#[derive(Default)]
pub struct KeyedLocks {
    entries: EntryMap,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    pub async fn acquire(&self, key: &str) -> KeyedGuard {
        let entry = {
            let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
            // A count of one means only the map refers to the entry: no
            // guard holds it and no waiter is queued on it. Such strays
            // appear when a queued waiter is dropped before completing.
            entries.retain(|_, entry| Arc::strong_count(entry) > 1);
            entries
                .entry(key.to_owned())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };

        let locked = entry.clone().lock_owned().await;
        KeyedGuard {
            _locked: locked,
            entry,
            key: key.to_owned(),
            entries: Arc::clone(&self.entries),
        }
    }
}

/// Exclusive hold on one key, released on drop.
pub struct KeyedGuard {
    _locked: tokio::sync::OwnedMutexGuard<()>,
    entry: Arc<tokio::sync::Mutex<()>>,
    key: String,
    entries: EntryMap,
}

impl Drop for KeyedGuard {
    fn drop(&mut self) {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        // Three refs when no one else is interested: the map's, this guard's
        // `entry`, and the one inside the still-live `_locked`. Every other
        // holder or waiter keeps its own clone, and new acquirers clone out
        // of the map, which we hold here, so the count cannot rise under us.
        if Arc::strong_count(&self.entry) == 3 {
            entries.remove(&self.key);
        }
    }
}
