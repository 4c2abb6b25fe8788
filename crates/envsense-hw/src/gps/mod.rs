//! GPS receiver module.
//!
//! Reads position fixes from a NEO-6M streaming NMEA 0183 over serial.

mod device;
pub mod nmea;

pub use device::NeoGps;
