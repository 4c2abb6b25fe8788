//! Single-writer publication of sensor state.
//!
//! The acquisition loop edits a private copy and swaps in a new `Arc`; readers
//! clone the current `Arc`. The lock is only held for the pointer exchange, so
//! a reader sees either the state before an update or the state after it.

use std::sync::{Arc, RwLock};

use super::buffer::RingBuffer;
use super::fault::FaultState;

/// Everything published for one sensor.
#[derive(Debug, Clone, Default)]
pub struct SensorState {
    pub buffer: RingBuffer,
    pub fault: FaultState,
}

/// Creates a connected writer/reader pair holding an empty state.
pub fn sensor_cell(buffer: RingBuffer) -> (SensorWriter, SensorReader) {
    let state = Arc::new(SensorState {
        buffer,
        fault: FaultState::default(),
    });
    let shared = Arc::new(RwLock::new(state.clone()));

    (
        SensorWriter {
            local: state,
            shared: shared.clone(),
        },
        SensorReader { shared },
    )
}

/// Write half, owned by exactly one acquisition loop.
#[derive(Debug)]
pub struct SensorWriter {
    local: Arc<SensorState>,
    shared: Arc<RwLock<Arc<SensorState>>>,
}

impl SensorWriter {
    /// Applies `f` to the state and publishes the result.
    pub fn update<R>(&mut self, f: impl FnOnce(&mut SensorState) -> R) -> R {
        let result = f(Arc::make_mut(&mut self.local));
        *self.shared.write().unwrap() = self.local.clone();
        result
    }
}

/// Read half, freely cloned.
#[derive(Debug, Clone)]
pub struct SensorReader {
    shared: Arc<RwLock<Arc<SensorState>>>,
}

impl SensorReader {
    /// Returns the most recently published state.
    pub fn load(&self) -> Arc<SensorState> {
        self.shared.read().unwrap().clone()
    }
}
