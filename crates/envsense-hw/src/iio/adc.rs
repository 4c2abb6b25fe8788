//! MCP3008 analog-to-digital converter channel.

use std::path::Path;

use tracing::debug;

use super::IioDevice;
use crate::adapter::SensorAdapter;
use crate::{RawSample, Result, SensorKind};

/// Full-scale reading of the 10-bit converter.
const FULL_SCALE: f64 = 1023.0;

/// One MCP3008 input read through the kernel `mcp320x` IIO driver.
///
/// Samples are normalized to 0.0-1.0 of the reference voltage.
pub struct Mcp3008 {
    device: IioDevice,
    attr: String,
}

impl Mcp3008 {
    /// Creates a driver for `channel` (0-7) of the ADC at `dir`.
    pub fn new<P: AsRef<Path>>(dir: P, channel: u8) -> Self {
        Self {
            device: IioDevice::new(dir),
            attr: format!("in_voltage{}_raw", channel),
        }
    }

    /// Converts a raw 10-bit reading to a 0.0-1.0 level.
    fn normalize(raw: i64) -> f64 {
        (raw as f64 / FULL_SCALE).clamp(0.0, 1.0)
    }
}

impl SensorAdapter for Mcp3008 {
    fn kind(&self) -> SensorKind {
        SensorKind::Mcp3008
    }

    async fn read_sample(&mut self) -> Result<RawSample> {
        let raw = self.device.read_attr(&self.attr).await?;
        let value = Self::normalize(raw);
        debug!("MCP3008 {}: raw={} value={:.3}", self.attr, raw, value);
        Ok(RawSample::Analog(value))
    }
}
