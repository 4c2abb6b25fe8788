//! DHT22 temperature/humidity sensor.

use std::path::Path;

use tracing::debug;

use super::IioDevice;
use crate::adapter::SensorAdapter;
use crate::{RawSample, Result, SensorKind};

/// Temperature channel, milli-degrees Celsius.
const TEMP_ATTR: &str = "in_temp_input";

/// Humidity channel, milli-percent relative humidity.
const HUMIDITY_ATTR: &str = "in_humidityrelative_input";

/// DHT22 read through the kernel `dht11` IIO driver.
///
/// The single-wire protocol is timing sensitive and reads fail fairly often
/// (EIO or ETIMEDOUT from sysfs). Those surface as ordinary read errors.
pub struct Dht22 {
    device: IioDevice,
}

impl Dht22 {
    /// Creates a DHT22 driver for an IIO device directory.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            device: IioDevice::new(dir),
        }
    }
}

impl SensorAdapter for Dht22 {
    fn kind(&self) -> SensorKind {
        SensorKind::Dht22
    }

    async fn read_sample(&mut self) -> Result<RawSample> {
        let millidegrees = self.device.read_attr(TEMP_ATTR).await?;
        let millipercent = self.device.read_attr(HUMIDITY_ATTR).await?;

        let temperature_c = millidegrees as f32 / 1000.0;
        let humidity = millipercent as f32 / 1000.0;
        debug!("DHT22: {}°C {}%RH", temperature_c, humidity);

        Ok(RawSample::climate(temperature_c, humidity))
    }
}
