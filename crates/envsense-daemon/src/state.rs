//! Application state: the sensor registry and the tasks polling it.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use envsense_hw::{
    BusLock, Dht22, Driver, Mcp3008, NeoGps, Sds011, SensorAdapter, SensorKind,
};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::info;

use crate::acquisition::{
    AcquisitionLoop, BackoffPolicy, CoreError, SensorReading, SnapshotReader,
};
use crate::config::{Config, SensorConfig};

/// Shared application state.
pub struct AppState {
    /// Read side of every sensor
    sensors: SnapshotReader,

    /// Running acquisition loops
    tasks: Mutex<JoinSet<()>>,

    /// Whether the HTTP API is served
    web_enabled: bool,

    /// Process start, for uptime reporting
    started_at: Instant,
}

impl AppState {
    /// Creates state with no sensors.
    pub fn new(web_enabled: bool) -> Self {
        Self {
            sensors: SnapshotReader::new(),
            tasks: Mutex::new(JoinSet::new()),
            web_enabled,
            started_at: Instant::now(),
        }
    }

    /// Builds the configured drivers and starts one acquisition loop each.
    ///
    /// Must be called from within the tokio runtime.
    pub fn start(config: &Config) -> Result<Self> {
        let mut state = Self::new(config.web.enable);
        let policy = config.backoff.policy();
        let mut buses: HashMap<String, BusLock> = HashMap::new();

        for sensor in &config.sensors {
            let driver = build_driver(sensor, &mut buses);
            let interval = sensor.interval(config.min_interval_ms);
            state.spawn(&sensor.id, driver, policy, interval)?;
            info!(
                "Sensor {} ({}) on {}",
                sensor.id,
                sensor.kind,
                sensor.device_path()
            );
        }

        Ok(state)
    }

    /// Registers a sensor and spawns its acquisition loop.
    pub fn spawn<A>(
        &mut self,
        id: &str,
        adapter: A,
        policy: BackoffPolicy,
        interval: Duration,
    ) -> Result<(), CoreError>
    where
        A: SensorAdapter + 'static,
    {
        let (writer, shutdown) = self.sensors.register(id, adapter.kind())?;
        let acquisition = AcquisitionLoop::new(id, adapter, writer, policy, interval, shutdown);
        self.tasks.get_mut().unwrap().spawn(acquisition.run());
        Ok(())
    }

    /// Returns the latest reading of a sensor.
    pub fn read(&self, id: &str) -> Result<SensorReading, CoreError> {
        self.sensors.read(id)
    }

    /// Lists sensor ids.
    pub fn list_sensors(&self) -> Vec<String> {
        self.sensors.list_sensors()
    }

    /// Number of configured sensors.
    pub fn sensor_count(&self) -> usize {
        self.sensors.sensor_count()
    }

    /// Returns true if the HTTP API is enabled.
    pub fn is_web_enabled(&self) -> bool {
        self.web_enabled
    }

    /// Seconds since startup.
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Signals every acquisition loop to stop and waits for them to finish.
    pub async fn shutdown(&self) {
        self.sensors.shutdown();
        let mut tasks = std::mem::take(&mut *self.tasks.lock().unwrap());
        while tasks.join_next().await.is_some() {}
        info!("All acquisition loops stopped");
    }
}

/// Creates the driver for one configured sensor.
///
/// Serial sensors on the same device path share one bus lock.
fn build_driver(sensor: &SensorConfig, buses: &mut HashMap<String, BusLock>) -> Driver {
    let device = sensor.device_path();
    let mut bus = || buses.entry(device.to_string()).or_default().clone();

    match sensor.kind {
        SensorKind::Sds011 => {
            let mut driver = Sds011::new(device, bus());
            if let Some(baud) = sensor.baud {
                driver = driver.with_baud_rate(baud);
            }
            Driver::Sds011(driver)
        }
        SensorKind::Neo6m => {
            let mut driver = NeoGps::new(device, bus());
            if let Some(baud) = sensor.baud {
                driver = driver.with_baud_rate(baud);
            }
            Driver::Neo6m(driver)
        }
        SensorKind::Dht22 => Driver::Dht22(Dht22::new(device)),
        SensorKind::Mcp3008 => Driver::Mcp3008(Mcp3008::new(device, sensor.channel)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::testing::ScriptedAdapter;
    use envsense_hw::RawSample;

    #[tokio::test(start_paused = true)]
    async fn test_spawn_and_shutdown() {
        let mut state = AppState::new(true);
        state
            .spawn(
                "mq7",
                ScriptedAdapter::new([Ok(RawSample::Analog(0.4))]),
                BackoffPolicy::default(),
                Duration::from_millis(100),
            )
            .unwrap();
        state
            .spawn(
                "gps",
                ScriptedAdapter::failing(),
                BackoffPolicy::default(),
                Duration::from_millis(100),
            )
            .unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(state.list_sensors(), vec!["gps", "mq7"]);
        assert_eq!(state.sensor_count(), 2);
        assert_eq!(state.read("mq7").unwrap().samples, vec![RawSample::Analog(0.4)]);
        assert!(state.read("gps").unwrap().faulted);

        state.shutdown().await;
        assert!(state.tasks.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_joins_loops_after_script_ends() {
        let mut state = AppState::new(false);
        for id in ["pm25", "dht22", "mq7"] {
            state
                .spawn(
                    id,
                    ScriptedAdapter::new([Ok(RawSample::Analog(0.1))]),
                    BackoffPolicy::default(),
                    Duration::from_millis(100),
                )
                .unwrap();
        }

        tokio::time::sleep(Duration::from_secs(10)).await;
        for id in ["pm25", "dht22", "mq7"] {
            assert_eq!(state.read(id).unwrap().samples.len(), 1);
        }

        let joined = tokio::time::timeout(Duration::from_secs(60), state.shutdown()).await;
        assert!(joined.is_ok(), "acquisition loops did not stop");
        assert!(state.tasks.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_sensor_does_not_delay_others() {
        let mut state = AppState::new(true);
        // Never completes its first read
        state
            .spawn(
                "stuck",
                ScriptedAdapter::stalled(),
                BackoffPolicy::default(),
                Duration::from_millis(100),
            )
            .unwrap();
        state
            .spawn(
                "mq7",
                ScriptedAdapter::new((0..5).map(|i| Ok(RawSample::Analog(i as f64 / 10.0)))),
                BackoffPolicy::default(),
                Duration::from_millis(100),
            )
            .unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(state.read("mq7").unwrap().samples.len(), 5);
        assert!(state.read("stuck").unwrap().age_seconds.is_none());
    }

    #[test]
    fn test_serial_sensors_share_bus_by_path() {
        let config = Config::parse(
            r#"
            [[sensors]]
            id = "pm-a"
            kind = "sds011"
            device = "/dev/ttyUSB0"

            [[sensors]]
            id = "pm-b"
            kind = "sds011"
            device = "/dev/ttyUSB0"

            [[sensors]]
            id = "gps"
            kind = "neo6m"
            "#,
        )
        .unwrap();

        let mut buses = HashMap::new();
        for sensor in &config.sensors {
            build_driver(sensor, &mut buses);
        }
        assert_eq!(buses.len(), 2);
        assert!(buses.contains_key("/dev/ttyUSB0"));
        assert!(buses.contains_key("/dev/ttyS0"));
    }

    #[test]
    fn test_build_driver_kinds() {
        let config = Config::default();
        let mut buses = HashMap::new();
        let kinds: Vec<_> = config
            .sensors
            .iter()
            .map(|s| build_driver(s, &mut buses).kind())
            .collect();
        assert_eq!(
            kinds,
            vec![
                SensorKind::Sds011,
                SensorKind::Dht22,
                SensorKind::Mcp3008,
                SensorKind::Neo6m
            ]
        );
    }
}
