//! Process-scoped cache of recently seen provider event ids.
//!
//! The cache starts empty, forgets entries older than the dedupe window and
//! is never persisted: a restart may re-process a redelivered event.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use chrono::Duration;
use taskflow_domain::id::ProviderEventId;
use taskflow_domain::time::Timestamp;

#[derive(Debug, Default)]
struct Entries {
    seen: HashMap<ProviderEventId, Timestamp>,
    /// Insertion order, used to expire the oldest entries first.
    order: VecDeque<(ProviderEventId, Timestamp)>,
}

impl Entries {
    fn purge(&mut self, now: Timestamp, window: Duration) {
        while let Some((id, seen_at)) = self.order.front() {
            if now - *seen_at < window {
                break;
            }
            // Only drop the map entry if it was not re-recorded later.
            if self.seen.get(id) == Some(seen_at) {
                self.seen.remove(id);
            }
            self.order.pop_front();
        }
    }
}

/// Time-bounded set of provider event ids.
#[derive(Debug)]
pub struct DedupeCache {
    window: Duration,
    entries: Mutex<Entries>,
}

impl DedupeCache {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: Mutex::new(Entries::default()),
        }
    }

    /// Record `id` as seen at `now`.
    ///
    /// Returns `true` if the id is new (or its previous sighting expired),
    /// `false` if it is a duplicate within the window.
    pub fn check_and_record(&self, id: &ProviderEventId, now: Timestamp) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.purge(now, self.window);
        if entries.seen.contains_key(id) {
            return false;
        }
        entries.seen.insert(id.clone(), now);
        entries.order.push_back((id.clone(), now));
        true
    }

    /// Drop `id` so that a redelivery is processed again.
    pub fn forget(&self, id: &ProviderEventId) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.seen.remove(id);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .seen
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
