//! Configuration management.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use envsense_hw::{
    SensorKind, DEFAULT_ADC_DEVICE, DEFAULT_GPS_PORT, DEFAULT_IIO_DEVICE, DEFAULT_PM_PORT,
};
use serde::{Deserialize, Serialize};

use crate::acquisition::BackoffPolicy;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server listen address (e.g., "0.0.0.0:8000")
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Minimum delay between two reads of the same sensor, in milliseconds
    #[serde(default = "default_min_interval")]
    pub min_interval_ms: u64,

    /// Web server configuration
    #[serde(default)]
    pub web: WebConfig,

    /// D-Bus configuration
    #[serde(default)]
    pub dbus: DbusConfig,

    /// Retry backoff after failed reads
    #[serde(default)]
    pub backoff: BackoffConfig,

    /// Sensors to poll
    #[serde(default = "default_sensors")]
    pub sensors: Vec<SensorConfig>,
}

/// Web server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Serve the HTTP API
    #[serde(default = "default_true")]
    pub enable: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self { enable: true }
    }
}

/// D-Bus bus type selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DbusBusType {
    /// Session bus (user session)
    Session,
    /// System bus (system-wide)
    System,
    /// Try session first, fall back to system
    #[default]
    Auto,
}

/// D-Bus configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DbusConfig {
    /// Which bus to register on
    #[serde(default)]
    pub bus: DbusBusType,
}

/// Backoff configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Delay after the first failed read, in milliseconds
    #[serde(default = "default_backoff_base")]
    pub base_ms: u64,

    /// Upper bound on the delay, in milliseconds
    #[serde(default = "default_backoff_max")]
    pub max_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: default_backoff_base(),
            max_ms: default_backoff_max(),
        }
    }
}

impl BackoffConfig {
    /// Builds the backoff policy.
    pub fn policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(self.base_ms),
            Duration::from_millis(self.max_ms),
        )
    }
}

/// One physical sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Id used in the API (e.g., "pm25")
    pub id: String,

    /// Sensor type
    pub kind: SensorKind,

    /// Serial port or IIO device directory; defaults depend on the kind
    #[serde(default)]
    pub device: Option<String>,

    /// Serial baud rate
    #[serde(default)]
    pub baud: Option<u32>,

    /// ADC input channel (MCP3008 only)
    #[serde(default)]
    pub channel: u8,

    /// Polling interval in milliseconds; never below `min_interval_ms`
    #[serde(default)]
    pub interval_ms: Option<u64>,
}

impl SensorConfig {
    fn new(id: &str, kind: SensorKind, device: &str) -> Self {
        Self {
            id: id.to_string(),
            kind,
            device: Some(device.to_string()),
            baud: None,
            channel: 0,
            interval_ms: None,
        }
    }

    fn every(mut self, interval_ms: u64) -> Self {
        self.interval_ms = Some(interval_ms);
        self
    }

    /// Device path, falling back to the kind's default.
    pub fn device_path(&self) -> &str {
        match &self.device {
            Some(device) => device,
            None => match self.kind {
                SensorKind::Sds011 => DEFAULT_PM_PORT,
                SensorKind::Neo6m => DEFAULT_GPS_PORT,
                SensorKind::Dht22 => DEFAULT_IIO_DEVICE,
                SensorKind::Mcp3008 => DEFAULT_ADC_DEVICE,
            },
        }
    }

    /// Effective polling interval.
    pub fn interval(&self, min_interval_ms: u64) -> Duration {
        let ms = self.interval_ms.unwrap_or(min_interval_ms);
        Duration::from_millis(ms.max(min_interval_ms))
    }
}

// Default value functions
fn default_listen() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_min_interval() -> u64 {
    100
}

fn default_true() -> bool {
    true
}

fn default_backoff_base() -> u64 {
    1000
}

fn default_backoff_max() -> u64 {
    30000
}

fn default_sensors() -> Vec<SensorConfig> {
    vec![
        SensorConfig::new("pm25", SensorKind::Sds011, DEFAULT_PM_PORT).every(1000),
        SensorConfig::new("dht22", SensorKind::Dht22, DEFAULT_IIO_DEVICE).every(2000),
        SensorConfig::new("mq7", SensorKind::Mcp3008, DEFAULT_ADC_DEVICE),
        SensorConfig::new("gps", SensorKind::Neo6m, DEFAULT_GPS_PORT).every(1000),
    ]
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
        Self::parse(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.backoff.base_ms == 0 {
            bail!("backoff.base_ms must be greater than zero");
        }
        if self.backoff.max_ms < self.backoff.base_ms {
            bail!("backoff.max_ms must not be smaller than backoff.base_ms");
        }

        let mut seen = HashSet::new();
        for sensor in &self.sensors {
            if sensor.id.trim().is_empty() {
                bail!("Sensor id must not be empty");
            }
            if !seen.insert(sensor.id.as_str()) {
                bail!("Duplicate sensor id: {}", sensor.id);
            }
            if sensor.kind == SensorKind::Mcp3008 && sensor.channel > 7 {
                bail!("Sensor {}: MCP3008 channel must be 0-7", sensor.id);
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            min_interval_ms: default_min_interval(),
            web: WebConfig::default(),
            dbus: DbusConfig::default(),
            backoff: BackoffConfig::default(),
            sensors: default_sensors(),
        }
    }
}
