//! Sample values produced by the sensor drivers.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported sensor types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    /// Nova SDS011 particulate matter sensor.
    Sds011,
    /// DHT22 temperature/humidity sensor.
    Dht22,
    /// MCP3008 ADC channel (MQ-7 gas sensor).
    Mcp3008,
    /// u-blox NEO-6M GPS receiver.
    Neo6m,
}

impl FromStr for SensorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sds011" => Ok(SensorKind::Sds011),
            "dht22" => Ok(SensorKind::Dht22),
            "mcp3008" => Ok(SensorKind::Mcp3008),
            "neo6m" => Ok(SensorKind::Neo6m),
            _ => Err(Error::InvalidKind(s.to_string())),
        }
    }
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorKind::Sds011 => write!(f, "sds011"),
            SensorKind::Dht22 => write!(f, "dht22"),
            SensorKind::Mcp3008 => write!(f, "mcp3008"),
            SensorKind::Neo6m => write!(f, "neo6m"),
        }
    }
}

/// A single reading from one sensor.
///
/// Serialized untagged so each variant keeps the plain shape API clients
/// already expect: particulate and climate readings as flat objects, analog
/// readings as a bare number and positions as a latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawSample {
    /// Particulate concentration in µg/m³.
    Particulate { pm2_5: f32, pm10: f32 },
    /// Temperature and relative humidity.
    Climate {
        temperature_c: f32,
        temperature_f: f32,
        humidity: f32,
    },
    /// Normalized analog level (0.0-1.0).
    Analog(f64),
    /// Signed decimal degrees.
    Position { latitude: f64, longitude: f64 },
}

impl RawSample {
    /// Builds a climate sample, deriving the Fahrenheit temperature.
    pub fn climate(temperature_c: f32, humidity: f32) -> Self {
        RawSample::Climate {
            temperature_c,
            temperature_f: temperature_c * (9.0 / 5.0) + 32.0,
            humidity,
        }
    }

    /// Returns the sensor kind that produces this sample shape.
    pub fn kind(&self) -> SensorKind {
        match self {
            RawSample::Particulate { .. } => SensorKind::Sds011,
            RawSample::Climate { .. } => SensorKind::Dht22,
            RawSample::Analog(_) => SensorKind::Mcp3008,
            RawSample::Position { .. } => SensorKind::Neo6m,
        }
    }
}
