//! Timestamp wrapper shared by fixes and scans.

use serde::{Deserialize, Serialize};

/// A value tagged with its capture time.
///
/// Timestamps are microseconds on the archive clock. Nothing here assumes
/// the clock is anchored to the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timestamped<T> {
    pub data: T,
    pub timestamp_us: u64,
}

impl<T> Timestamped<T> {
    #[inline]
    pub fn new(data: T, timestamp_us: u64) -> Self {
        Self { data, timestamp_us }
    }

    /// Microseconds elapsed since `earlier`, or `None` if `earlier` is later.
    #[inline]
    pub fn elapsed_since<U>(&self, earlier: &Timestamped<U>) -> Option<u64> {
        self.timestamp_us.checked_sub(earlier.timestamp_us)
    }
}
