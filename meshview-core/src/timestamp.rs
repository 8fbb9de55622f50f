//! Modification timestamps
//!
//! Staleness checks compare stamps taken from a single process-wide counter,
//! so a stamp taken later always compares greater than one taken earlier,
//! regardless of which object took it.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

static GLOBAL_CLOCK: AtomicU64 = AtomicU64::new(0);

/// A point on the global modification clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct TimeStamp(u64);

impl TimeStamp {
    /// A stamp older than every stamp returned by [`TimeStamp::now`]
    pub const NEVER: TimeStamp = TimeStamp(0);

    /// Take a fresh stamp from the global clock
    pub fn now() -> Self {
        TimeStamp(GLOBAL_CLOCK.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Move this stamp to the current time
    pub fn modified(&mut self) {
        *self = Self::now();
    }

    /// Whether the stamp was ever set
    pub fn is_never(&self) -> bool {
        self.0 == 0
    }

    /// Raw counter value
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Objects that expose their last modification time
pub trait Modified {
    fn mtime(&self) -> TimeStamp;
}
