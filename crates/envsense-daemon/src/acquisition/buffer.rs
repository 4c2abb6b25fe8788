//! Fixed-capacity sample storage for one sensor.

use std::collections::VecDeque;

use envsense_hw::RawSample;
use tokio::time::Instant;

/// Number of samples retained per sensor.
pub const BUFFER_CAPACITY: usize = 10;

/// A sample stamped with when and in which order it was acquired.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorRecord {
    /// The reading.
    pub sample: RawSample,
    /// Monotonic acquisition time.
    pub acquired_at: Instant,
    /// Per-sensor sequence number, one per successful read.
    pub sequence: u64,
}

/// Ring buffer of the most recent records, oldest first.
///
/// Also tracks when the last record arrived and how many reads have failed
/// over the sensor's lifetime.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    records: VecDeque<SensorRecord>,
    capacity: usize,
    last_success: Option<Instant>,
    total_faults: u64,
}

impl RingBuffer {
    /// Creates an empty buffer holding at most `capacity` records.
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            last_success: None,
            total_faults: 0,
        }
    }

    /// Appends a record, evicting the oldest one when full.
    pub fn append(&mut self, record: SensorRecord) {
        debug_assert!(
            self.records
                .back()
                .map_or(true, |last| last.sequence <= record.sequence),
            "records must arrive in sequence order"
        );

        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.last_success = Some(record.acquired_at);
        self.records.push_back(record);
    }

    /// Counts a failed read.
    pub fn record_fault(&mut self) {
        self.total_faults = self.total_faults.saturating_add(1);
    }

    /// Returns a copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<SensorRecord> {
        self.records.iter().cloned().collect()
    }

    /// Iterates over the records, oldest first.
    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &SensorRecord> {
        self.records.iter()
    }

    /// Number of records held.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no record has been stored yet.
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Maximum number of records.
    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Acquisition time of the newest record, if any.
    pub fn last_success(&self) -> Option<Instant> {
        self.last_success
    }

    /// Failed reads since startup.
    pub fn total_faults(&self) -> u64 {
        self.total_faults
    }
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::new(BUFFER_CAPACITY)
    }
}
