//! Bounded in-memory sample history.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::models::Sample;
use super::stats::{compute_statistics, Statistics};

/// Default number of samples kept.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Thread-safe ring of the most recent samples.
///
/// Holds at most `capacity` samples; appending to a full store evicts the
/// oldest one. Readers only ever receive copies of the contents.
pub struct HistoryStore {
    capacity: usize,
    samples: Mutex<VecDeque<Arc<Sample>>>,
}

impl HistoryStore {
    /// Create a store holding at most `capacity` samples (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Arc<Sample>>> {
        self.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a sample, evicting the oldest when full.
    ///
    /// Returns the stored sample.
    pub fn append(&self, sample: Sample) -> Arc<Sample> {
        let sample = Arc::new(sample);
        let mut samples = self.lock();
        while samples.len() >= self.capacity {
            samples.pop_front();
        }
        samples.push_back(sample.clone());
        tracing::debug!(len = samples.len(), capacity = self.capacity, "Sample appended to history");
        sample
    }

    /// Copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<Arc<Sample>> {
        self.lock().iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<Arc<Sample>> {
        self.lock().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Statistics over the current contents.
    ///
    /// The contents are copied under the lock and reduced outside it, so a
    /// concurrent `append` waits at most for the copy.
    pub fn statistics(&self) -> Statistics {
        compute_statistics(&self.snapshot())
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
