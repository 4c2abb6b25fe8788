//! Sensors exposed through the Linux Industrial I/O subsystem.
//!
//! The kernel's `dht11` driver (which also handles the DHT22) and `mcp320x`
//! ADC driver publish their channels as sysfs attributes under
//! `/sys/bus/iio/devices/iio:deviceN/`. Reading an attribute triggers a
//! conversion, so each read is a fresh measurement.

mod adc;
mod dht;

pub use adc::Mcp3008;
pub use dht::Dht22;

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// One IIO device directory.
#[derive(Debug, Clone)]
pub struct IioDevice {
    dir: PathBuf,
}

impl IioDevice {
    /// Creates a handle for the given device directory.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Returns the device directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reads an integer channel attribute such as `in_temp_input`.
    pub async fn read_attr(&self, name: &str) -> Result<i64> {
        let path = self.dir.join(name);
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound && !self.dir.exists() {
                Error::DeviceNotFound(self.dir.display().to_string())
            } else {
                Error::Io(e)
            }
        })?;

        let value = content.trim();
        value.parse().map_err(|_| Error::InvalidValue {
            path: path.display().to_string(),
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_attr() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("in_voltage0_raw"), "512\n").unwrap();
        std::fs::write(dir.path().join("in_voltage1_raw"), "garbage\n").unwrap();

        let device = IioDevice::new(dir.path());
        assert_eq!(device.read_attr("in_voltage0_raw").await.unwrap(), 512);
        assert!(matches!(
            device.read_attr("in_voltage1_raw").await,
            Err(Error::InvalidValue { .. })
        ));
        assert!(matches!(
            device.read_attr("in_voltage2_raw").await,
            Err(Error::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_device_dir() {
        let device = IioDevice::new("/sys/bus/iio/devices/envsense-missing");
        assert!(matches!(
            device.read_attr("in_temp_input").await,
            Err(Error::DeviceNotFound(_))
        ));
    }
}
