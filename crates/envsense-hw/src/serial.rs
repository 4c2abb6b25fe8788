//! Serial port helpers shared by the SDS011 and NEO-6M drivers.

use crate::{Error, Result};
use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::debug;

/// Opens a port as 8N1 at the given baud rate.
pub(crate) fn open(port_path: &str, baud_rate: u32) -> Result<SerialStream> {
    let port = tokio_serial::new(port_path, baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .open_native_async()
        .map_err(|e| {
            if let tokio_serial::ErrorKind::Io(kind) = &e.kind {
                if (*kind == std::io::ErrorKind::NotFound
                    || *kind == std::io::ErrorKind::PermissionDenied)
                    && !std::path::Path::new(port_path).exists()
                {
                    return Error::DeviceNotFound(port_path.to_string());
                }
            }
            Error::Serial(e)
        })?;

    debug!("Opened serial port {} at {} baud", port_path, baud_rate);
    Ok(port)
}
