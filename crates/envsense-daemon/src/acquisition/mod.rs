//! Sensor acquisition and buffering.
//!
//! One [`AcquisitionLoop`] per sensor polls its adapter and publishes into a
//! ring buffer; the [`SnapshotReader`] serves the latest state to the API
//! without ever touching hardware.

mod buffer;
mod cell;
mod fault;
mod poller;
mod reader;
#[cfg(test)]
pub(crate) mod testing;

pub use fault::BackoffPolicy;
pub use poller::AcquisitionLoop;
pub use reader::{CoreError, SensorReading, SnapshotReader};
