//! Particulate matter sensor module.
//!
//! Reads the Nova SDS011 over a serial line.

mod device;
pub mod protocol;

pub use device::Sds011;
