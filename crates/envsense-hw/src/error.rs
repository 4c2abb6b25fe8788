//! Error types for the envsense hardware library.

use std::time::Duration;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when reading a sensor.
///
/// The `Display` form of each variant is what ends up as the fault reason
/// reported for a sensor, so messages are kept short and self-contained.
#[derive(Error, Debug)]
pub enum Error {
    /// Device node does not exist.
    #[error("Device not found at {0}")]
    DeviceNotFound(String),

    /// Serial port communication error.
    #[error("Serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// I/O error on a serial line or sysfs attribute.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device did not answer in time.
    #[error("Read timed out after {0:?}")]
    Timeout(Duration),

    /// A serial frame was malformed.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// A frame or sentence checksum did not match.
    #[error("Checksum mismatch: expected {expected:#04X}, got {actual:#04X}")]
    Checksum { expected: u8, actual: u8 },

    /// A sysfs attribute did not hold an integer.
    #[error("Invalid value in {path}: {value:?}")]
    InvalidValue { path: String, value: String },

    /// An NMEA sentence could not be parsed.
    #[error("Invalid NMEA sentence: {0}")]
    InvalidSentence(String),

    /// The GPS receiver has no position fix yet.
    #[error("No GPS fix")]
    NoFix,

    /// Unknown sensor kind name.
    #[error("Invalid sensor kind: {0}")]
    InvalidKind(String),
}
