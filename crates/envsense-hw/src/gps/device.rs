//! NEO-6M device communication via serial port.

use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_serial::SerialStream;
use tracing::{debug, trace};

use super::nmea::{is_gga, parse_gga};
use crate::adapter::{BusLock, SensorAdapter};
use crate::{serial, Error, RawSample, Result, SensorKind, DEFAULT_BAUD_RATE};

/// Time allowed to obtain one fix.
const FIX_TIMEOUT: Duration = Duration::from_secs(5);

/// Sentences read per attempt. The receiver emits six or so per second.
const MAX_SENTENCES: usize = 40;

/// u-blox NEO-6M GPS receiver.
///
/// Each read consumes the NMEA stream until a GGA sentence with a valid fix
/// arrives, bounded by [`FIX_TIMEOUT`] and [`MAX_SENTENCES`].
pub struct NeoGps {
    port_path: String,
    baud_rate: u32,
    bus: BusLock,
    port: Option<BufReader<SerialStream>>,
}

impl NeoGps {
    /// Creates a new GPS driver. The port is opened on first read.
    pub fn new(port_path: &str, bus: BusLock) -> Self {
        Self {
            port_path: port_path.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            bus,
            port: None,
        }
    }

    /// Overrides the baud rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Returns the port path.
    pub fn port_path(&self) -> &str {
        &self.port_path
    }

    fn port(&mut self) -> Result<&mut BufReader<SerialStream>> {
        match &mut self.port {
            Some(port) => Ok(port),
            slot => {
                let stream = serial::open(&self.port_path, self.baud_rate)?;
                Ok(slot.insert(BufReader::new(stream)))
            }
        }
    }

    async fn next_fix(&mut self) -> Result<(f64, f64)> {
        read_fix(self.port()?).await
    }
}

/// Scans NMEA lines for a GGA sentence with a valid fix.
///
/// Gives up after [`MAX_SENTENCES`] lines with the last parse error, or
/// [`Error::NoFix`] if no GGA sentence was seen.
async fn read_fix<R: AsyncBufRead + Unpin>(port: &mut R) -> Result<(f64, f64)> {
    let mut buf = Vec::with_capacity(128);
    let mut last_err = Error::NoFix;

    for _ in 0..MAX_SENTENCES {
        buf.clear();
        if port.read_until(b'\n', &mut buf).await? == 0 {
            return Err(Error::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }

        let line = String::from_utf8_lossy(&buf);
        trace!("NMEA: {}", line.trim_end());
        if !is_gga(&line) {
            continue;
        }

        match parse_gga(&line) {
            Ok(position) => return Ok(position),
            Err(e) => last_err = e,
        }
    }

    Err(last_err)
}

impl SensorAdapter for NeoGps {
    fn kind(&self) -> SensorKind {
        SensorKind::Neo6m
    }

    async fn read_sample(&mut self) -> Result<RawSample> {
        let bus = self.bus.clone();
        let result = {
            let _guard = bus.acquire().await;
            tokio::time::timeout(FIX_TIMEOUT, self.next_fix()).await
        };

        match result {
            Ok(Ok((latitude, longitude))) => {
                debug!("GPS fix: {:.6}, {:.6}", latitude, longitude);
                Ok(RawSample::Position {
                    latitude,
                    longitude,
                })
            }
            Ok(Err(e)) => {
                if matches!(e, Error::Io(_) | Error::Serial(_)) {
                    self.port = None;
                }
                Err(e)
            }
            Err(_) => Err(Error::Timeout(FIX_TIMEOUT)),
        }
    }
}
