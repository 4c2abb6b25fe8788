//! Read-side access to every configured sensor.

use std::collections::BTreeMap;

use envsense_hw::{RawSample, SensorKind};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;

use super::buffer::RingBuffer;
use super::cell::{sensor_cell, SensorReader, SensorWriter};

/// Errors returned to API callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// No sensor is configured under this id.
    #[error("Unknown sensor: {0}")]
    UnknownSensor(String),

    /// A sensor id was registered twice.
    #[error("Duplicate sensor: {0}")]
    DuplicateSensor(String),
}

/// The latest state of one sensor, shaped for API consumers.
#[derive(Debug, Clone, Serialize)]
pub struct SensorReading {
    /// Sensor id.
    pub id: String,
    /// Sensor type.
    pub kind: SensorKind,
    /// Up to ten samples, most recent last.
    pub samples: Vec<RawSample>,
    /// Seconds since the newest sample; `None` until the first sample.
    pub age_seconds: Option<f64>,
    /// True while the sensor's most recent read(s) failed.
    pub faulted: bool,
    /// Failed reads since the last success.
    pub consecutive_faults: u32,
    /// Failed reads since startup.
    pub total_faults: u64,
    /// Reason of the latest failure while faulted.
    pub last_fault: Option<String>,
    /// Seconds until the next retry while faulted.
    pub retry_in_seconds: Option<f64>,
}

struct SensorEntry {
    kind: SensorKind,
    reader: SensorReader,
}

/// Snapshot reader over all sensors, plus the shutdown signal for their loops.
pub struct SnapshotReader {
    sensors: BTreeMap<String, SensorEntry>,
    shutdown: watch::Sender<bool>,
}

impl SnapshotReader {
    /// Creates a reader with no sensors.
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            sensors: BTreeMap::new(),
            shutdown,
        }
    }

    /// Registers a sensor, returning the write half for its acquisition loop
    /// and a receiver for the shutdown signal.
    pub fn register(
        &mut self,
        id: &str,
        kind: SensorKind,
    ) -> Result<(SensorWriter, watch::Receiver<bool>), CoreError> {
        if self.sensors.contains_key(id) {
            return Err(CoreError::DuplicateSensor(id.to_string()));
        }

        let (writer, reader) = sensor_cell(RingBuffer::default());
        self.sensors
            .insert(id.to_string(), SensorEntry { kind, reader });
        Ok((writer, self.shutdown.subscribe()))
    }

    /// Returns the current samples and staleness of a sensor.
    ///
    /// Never waits on hardware; a faulted sensor still returns whatever it
    /// last read successfully.
    pub fn read(&self, id: &str) -> Result<SensorReading, CoreError> {
        let entry = self
            .sensors
            .get(id)
            .ok_or_else(|| CoreError::UnknownSensor(id.to_string()))?;
        let state = entry.reader.load();

        let now = Instant::now();
        let age_seconds = state
            .buffer
            .last_success()
            .map(|at| now.saturating_duration_since(at).as_secs_f64());
        let retry_in_seconds = state
            .fault
            .retry_at()
            .map(|at| at.saturating_duration_since(now).as_secs_f64());

        Ok(SensorReading {
            id: id.to_string(),
            kind: entry.kind,
            samples: state.buffer.snapshot().into_iter().map(|r| r.sample).collect(),
            age_seconds,
            faulted: !state.fault.is_healthy(),
            consecutive_faults: state.fault.consecutive(),
            total_faults: state.buffer.total_faults(),
            last_fault: state.fault.last_reason().map(str::to_string),
            retry_in_seconds,
        })
    }

    /// Returns the configured sensor ids in sorted order.
    pub fn list_sensors(&self) -> Vec<String> {
        self.sensors.keys().cloned().collect()
    }

    /// Number of configured sensors.
    pub fn sensor_count(&self) -> usize {
        self.sensors.len()
    }

    /// Asks every acquisition loop to stop after its current cycle.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}

impl Default for SnapshotReader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::buffer::SensorRecord;
    use crate::acquisition::fault::BackoffPolicy;
    use crate::acquisition::poller::AcquisitionLoop;
    use crate::acquisition::testing::ScriptedAdapter;
    use std::time::Duration;

    fn pm(value: f32) -> RawSample {
        RawSample::Particulate {
            pm2_5: value,
            pm10: value,
        }
    }

    #[test]
    fn test_unknown_sensor() {
        let reader = SnapshotReader::new();
        assert_eq!(
            reader.read("nonexistent").unwrap_err(),
            CoreError::UnknownSensor("nonexistent".to_string())
        );
    }

    #[test]
    fn test_duplicate_registration() {
        let mut reader = SnapshotReader::new();
        reader.register("pm25", SensorKind::Sds011).unwrap();
        assert!(matches!(
            reader.register("pm25", SensorKind::Sds011),
            Err(CoreError::DuplicateSensor(_))
        ));
    }

    #[test]
    fn test_list_sensors_sorted() {
        let mut reader = SnapshotReader::new();
        reader.register("pm25", SensorKind::Sds011).unwrap();
        reader.register("dht22", SensorKind::Dht22).unwrap();
        reader.register("gps", SensorKind::Neo6m).unwrap();
        assert_eq!(reader.list_sensors(), vec!["dht22", "gps", "pm25"]);
        assert_eq!(reader.sensor_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_data_yet_vs_stale() {
        let mut reader = SnapshotReader::new();
        let (mut writer, _) = reader.register("mq7", SensorKind::Mcp3008).unwrap();

        let reading = reader.read("mq7").unwrap();
        assert!(reading.samples.is_empty());
        assert!(reading.age_seconds.is_none());
        assert!(!reading.faulted);

        writer.update(|s| {
            s.buffer.append(SensorRecord {
                sample: RawSample::Analog(0.25),
                acquired_at: Instant::now(),
                sequence: 0,
            })
        });
        tokio::time::advance(Duration::from_secs(90)).await;

        let reading = reader.read("mq7").unwrap();
        assert_eq!(reading.samples, vec![RawSample::Analog(0.25)]);
        let age = reading.age_seconds.unwrap();
        assert!((age - 90.0).abs() < 0.01, "age was {}", age);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_faulting_sensor() {
        let mut reader = SnapshotReader::new();
        let (writer, shutdown) = reader.register("gps", SensorKind::Neo6m).unwrap();
        tokio::spawn(
            AcquisitionLoop::new(
                "gps",
                ScriptedAdapter::failing(),
                writer,
                BackoffPolicy::default(),
                Duration::from_millis(100),
                shutdown,
            )
            .run(),
        );

        tokio::time::sleep(Duration::from_millis(1)).await;
        let reading = reader.read("gps").unwrap();
        assert!(reading.samples.is_empty());
        assert!(reading.age_seconds.is_none());
        assert!(reading.faulted);
        assert_eq!(reading.consecutive_faults, 1);
        let retry = reading.retry_in_seconds.unwrap();
        assert!(retry > 0.9 && retry <= 1.0, "retry in {}", retry);

        tokio::time::sleep(Duration::from_secs(600)).await;
        let reading = reader.read("gps").unwrap();
        assert!(reading.samples.is_empty());
        assert!(reading.age_seconds.is_none());
        assert!(reading.faulted);
        assert!(reading.last_fault.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovery_end_to_end() {
        let mut reader = SnapshotReader::new();
        let (writer, shutdown) = reader.register("pm25", SensorKind::Sds011).unwrap();
        let adapter = ScriptedAdapter::new([
            Ok(pm(1.0)),
            Ok(pm(2.0)),
            Ok(pm(3.0)),
            Err("timeout".to_string()),
            Err("timeout".to_string()),
            Ok(pm(4.0)),
        ]);
        let handle = tokio::spawn(
            AcquisitionLoop::new(
                "pm25",
                adapter,
                writer,
                BackoffPolicy::default(),
                Duration::from_millis(100),
                shutdown,
            )
            .run(),
        );

        // Faults at 0.3s and 1.3s, recovery at 3.3s
        tokio::time::sleep(Duration::from_millis(3350)).await;
        let reading = reader.read("pm25").unwrap();
        assert_eq!(reading.samples, vec![pm(1.0), pm(2.0), pm(3.0), pm(4.0)]);
        assert!(!reading.faulted);
        assert_eq!(reading.consecutive_faults, 0);
        assert_eq!(reading.total_faults, 2);
        assert!(reading.last_fault.is_none());
        assert!(reading.retry_in_seconds.is_none());

        reader.shutdown();
        handle.await.unwrap();
    }
}
