//! envsense hardware library
//!
//! Driver adapters for the environmental sensors wired to a single-board
//! computer: a Nova SDS011 particulate sensor and a NEO-6M GPS receiver on
//! serial lines, and a DHT22 thermo-hygrometer and MCP3008 ADC (MQ-7 gas
//! sensor) exposed by the Linux IIO subsystem.

pub mod adapter;
pub mod error;
pub mod gps;
pub mod iio;
pub mod pm;
pub mod sample;
mod serial;

pub use adapter::{BusLock, Driver, SensorAdapter};
pub use error::{Error, Result};
pub use gps::NeoGps;
pub use iio::{Dht22, Mcp3008};
pub use pm::Sds011;
pub use sample::{RawSample, SensorKind};

/// Default baud rate shared by the SDS011 and NEO-6M.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default serial port of the particulate sensor (USB-serial adapter).
pub const DEFAULT_PM_PORT: &str = "/dev/ttyUSB0";

/// Default serial port of the GPS receiver (on-board UART).
pub const DEFAULT_GPS_PORT: &str = "/dev/ttyS0";

/// Default IIO device directory of the DHT22 (first IIO device probed).
pub const DEFAULT_IIO_DEVICE: &str = "/sys/bus/iio/devices/iio:device0";

/// Default IIO device directory of the MCP3008.
pub const DEFAULT_ADC_DEVICE: &str = "/sys/bus/iio/devices/iio:device1";
