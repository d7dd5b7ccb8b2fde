//! Seams of the batch run: where records go and where time comes from.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use super::error::PersistenceError;
use super::types::ExtractionRecord;

/// Durable per-iteration tabular store.
pub trait RecordStore {
    /// Append one record to the iteration's store, creating it on first write.
    /// Returns the store location.
    fn append(&mut self, iteration: u32, record: &ExtractionRecord)
        -> Result<PathBuf, PersistenceError>;

    /// Location of a store left over for `iteration` from an earlier run.
    fn existing(&self, _iteration: u32) -> Option<PathBuf> {
        None
    }
}

/// Monotonic time source for the throttle. Tests substitute a virtual clock.
pub trait Clock {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;

    fn sleep(&self, duration: Duration);
}

pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
