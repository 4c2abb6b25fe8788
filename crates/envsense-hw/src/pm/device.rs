//! SDS011 device communication via serial port.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio_serial::SerialStream;
use tracing::{debug, trace};

use super::protocol::{build_query_packet, parse_frame, FRAME_SIZE, HEAD};
use crate::adapter::{BusLock, SensorAdapter};
use crate::{serial, Error, RawSample, Result, SensorKind, DEFAULT_BAUD_RATE};

/// Per-read timeout. The sensor answers a query within about one second.
const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Bytes skipped while hunting for a frame head before giving up.
const MAX_SYNC_BYTES: usize = 3 * FRAME_SIZE;

/// Frames inspected per query (command replies may precede the data frame).
const MAX_FRAMES: usize = 3;

/// Nova SDS011 particulate matter sensor.
pub struct Sds011 {
    port_path: String,
    baud_rate: u32,
    bus: BusLock,
    port: Option<SerialStream>,
}

impl Sds011 {
    /// Creates a new SDS011 driver. The port is opened on first read.
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

    fn port(&mut self) -> Result<&mut SerialStream> {
        match &mut self.port {
            Some(port) => Ok(port),
            slot => Ok(slot.insert(serial::open(&self.port_path, self.baud_rate)?)),
        }
    }

    /// Sends a query and waits for the measurement frame.
    async fn query(&mut self) -> Result<(f32, f32)> {
        let port = self.port()?;

        port.write_all(&build_query_packet()).await?;
        port.flush().await?;

        read_measurement(port).await
    }
}

/// Reads frames until a valid measurement arrives, skipping command replies.
async fn read_measurement<R: AsyncRead + Unpin>(port: &mut R) -> Result<(f32, f32)> {
    let mut last_err = Error::InvalidFrame("no frame received".to_string());
    for _ in 0..MAX_FRAMES {
        let frame = read_frame(port).await?;
        trace!("SDS011 frame: {:02X?}", frame);
        match parse_frame(&frame) {
            Ok(values) => return Ok(values),
            Err(e) => last_err = e,
        }
    }
    Err(last_err)
}

/// Reads one frame, resynchronizing on the head byte.
async fn read_frame<R: AsyncRead + Unpin>(port: &mut R) -> Result<[u8; FRAME_SIZE]> {
    let mut frame = [0u8; FRAME_SIZE];

    let mut skipped = 0;
    loop {
        port.read_exact(&mut frame[..1]).await?;
        if frame[0] == HEAD {
            break;
        }
        skipped += 1;
        if skipped >= MAX_SYNC_BYTES {
            return Err(Error::InvalidFrame(format!(
                "no frame head in {} bytes",
                skipped
            )));
        }
    }

    port.read_exact(&mut frame[1..]).await?;
    Ok(frame)
}

impl SensorAdapter for Sds011 {
    fn kind(&self) -> SensorKind {
        SensorKind::Sds011
    }

    async fn read_sample(&mut self) -> Result<RawSample> {
        let bus = self.bus.clone();
        let result = {
            let _guard = bus.acquire().await;
            tokio::time::timeout(READ_TIMEOUT, self.query()).await
        };

        match result {
            Ok(Ok((pm2_5, pm10))) => {
                debug!("SDS011 on {}: PM2.5={} PM10={}", self.port_path, pm2_5, pm10);
                Ok(RawSample::Particulate { pm2_5, pm10 })
            }
            Ok(Err(e)) => {
                // Reopen the port next time after transport errors
                if matches!(e, Error::Io(_) | Error::Serial(_)) {
                    self.port = None;
                }
                Err(e)
            }
            Err(_) => {
                self.port = None;
                Err(Error::Timeout(READ_TIMEOUT))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pm::protocol::checksum;

    /// A data frame for PM2.5 = 21.2, PM10 = 30.5.
    fn data_frame() -> [u8; FRAME_SIZE] {
        let mut frame = [0xAA, 0xC0, 0xD4, 0x00, 0x31, 0x01, 0x12, 0x34, 0x00, 0xAB];
        frame[8] = checksum(&frame[2..8]);
        frame
    }

    /// A "set working period" reply, as sent after a command.
    fn reply_frame() -> [u8; FRAME_SIZE] {
        let mut frame = [0xAA, 0xC5, 0x08, 0x01, 0x00, 0x00, 0x12, 0x34, 0x00, 0xAB];
        frame[8] = checksum(&frame[2..8]);
        frame
    }

    fn assert_measurement((pm2_5, pm10): (f32, f32)) {
        assert!((pm2_5 - 21.2).abs() < 1e-4);
        assert!((pm10 - 30.5).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_resyncs_on_frame_head() {
        let mut bytes = vec![0x00, 0x13, 0xAB, 0xFF];
        bytes.extend_from_slice(&data_frame());

        let mut stream = bytes.as_slice();
        assert_measurement(read_measurement(&mut stream).await.unwrap());
        assert!(stream.is_empty());
    }

    #[tokio::test]
    async fn test_skips_reply_frames() {
        let mut bytes = reply_frame().to_vec();
        bytes.extend_from_slice(&data_frame());

        let mut stream = bytes.as_slice();
        assert_measurement(read_measurement(&mut stream).await.unwrap());
    }

    #[tokio::test]
    async fn test_gives_up_after_reply_frames_only() {
        let bytes: Vec<u8> = (0..MAX_FRAMES).flat_map(|_| reply_frame()).collect();

        let mut stream = bytes.as_slice();
        assert!(matches!(
            read_measurement(&mut stream).await,
            Err(Error::InvalidFrame(_))
        ));
    }

    #[tokio::test]
    async fn test_gives_up_without_frame_head() {
        let mut bytes = vec![0x55; MAX_SYNC_BYTES];
        bytes.extend_from_slice(&data_frame());

        let mut stream = bytes.as_slice();
        match read_frame(&mut stream).await {
            Err(Error::InvalidFrame(msg)) => assert!(msg.contains("no frame head")),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_truncated_frame_is_io_error() {
        let frame = data_frame();
        let mut stream = &frame[..6];
        assert!(matches!(read_frame(&mut stream).await, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_missing_port_is_device_not_found() {
        let mut sensor = Sds011::new("/dev/envsense-does-not-exist", BusLock::new());
        let err = sensor.read_sample().await.unwrap_err();
        assert!(matches!(err, Error::DeviceNotFound(_) | Error::Serial(_)));
        assert!(sensor.port.is_none());
    }
}
