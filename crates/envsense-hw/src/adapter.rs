//! The sensor adapter capability and shared-bus locking.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use crate::{Dht22, Mcp3008, NeoGps, RawSample, Result, Sds011, SensorKind};

/// One physical sensor that can be asked for a sample.
///
/// Implementations own their device handle and are responsible for their own
/// read timeouts; a failed read is reported as an [`crate::Error`] and the
/// caller decides whether and when to retry.
pub trait SensorAdapter: Send {
    /// Returns the sensor type.
    fn kind(&self) -> SensorKind;

    /// Reads one sample from the device.
    fn read_sample(&mut self) -> impl Future<Output = Result<RawSample>> + Send;
}

/// Mutual exclusion for sensors sharing one physical bus.
///
/// Clones share the same lock. Drivers take it only around the raw device
/// transaction.
#[derive(Debug, Clone, Default)]
pub struct BusLock(Arc<Mutex<()>>);

impl BusLock {
    /// Creates a new, unshared lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to the bus.
    pub async fn acquire(&self) -> MutexGuard<'_, ()> {
        self.0.lock().await
    }
}

/// Any of the supported drivers, for composition roots that build adapters
/// from configuration.
pub enum Driver {
    Sds011(Sds011),
    Dht22(Dht22),
    Mcp3008(Mcp3008),
    Neo6m(NeoGps),
}

impl SensorAdapter for Driver {
    fn kind(&self) -> SensorKind {
        match self {
            Driver::Sds011(d) => d.kind(),
            Driver::Dht22(d) => d.kind(),
            Driver::Mcp3008(d) => d.kind(),
            Driver::Neo6m(d) => d.kind(),
        }
    }

    async fn read_sample(&mut self) -> Result<RawSample> {
        match self {
            Driver::Sds011(d) => d.read_sample().await,
            Driver::Dht22(d) => d.read_sample().await,
            Driver::Mcp3008(d) => d.read_sample().await,
            Driver::Neo6m(d) => d.read_sample().await,
        }
    }
}
