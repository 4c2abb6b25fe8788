//! D-Bus interface implementation using zbus.
//!
//! Provides the `org.envsense.Daemon1` interface.

use std::sync::Arc;

use tracing::{debug, info, warn};
use zbus::{interface, Connection};

use crate::acquisition::CoreError;
use crate::config::DbusBusType;
use crate::state::AppState;

/// Well-known bus name.
const SERVICE_NAME: &str = "org.envsense.Daemon";

/// Object path of the daemon interface.
const OBJECT_PATH: &str = "/org/envsense/Daemon";

/// D-Bus interface implementation for the envsense daemon.
pub struct Daemon1Interface {
    state: Arc<AppState>,
    shutdown_tx: tokio::sync::mpsc::Sender<()>,
}

impl Daemon1Interface {
    /// Creates a new D-Bus interface.
    pub fn new(state: Arc<AppState>, shutdown_tx: tokio::sync::mpsc::Sender<()>) -> Self {
        Self { state, shutdown_tx }
    }

    fn reading_json(&self, id: &str) -> zbus::fdo::Result<String> {
        let reading = self.state.read(id).map_err(|e| match e {
            CoreError::UnknownSensor(_) => zbus::fdo::Error::InvalidArgs(e.to_string()),
            CoreError::DuplicateSensor(_) => zbus::fdo::Error::Failed(e.to_string()),
        })?;
        serde_json::to_string(&reading).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }
}

#[interface(name = "org.envsense.Daemon1")]
impl Daemon1Interface {
    /// Lists configured sensor ids.
    fn list_sensors(&self) -> Vec<String> {
        self.state.list_sensors()
    }

    /// Returns the latest reading of a sensor as JSON.
    fn read_sensor(&self, id: &str) -> zbus::fdo::Result<String> {
        debug!("D-Bus: ReadSensor({})", id);
        self.reading_json(id)
    }

    /// Shuts down the daemon.
    async fn quit(&self) -> zbus::fdo::Result<()> {
        info!("D-Bus: Quit requested");
        self.shutdown_tx
            .send(())
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// Number of configured sensors.
    #[zbus(property)]
    fn sensor_count(&self) -> u32 {
        self.state.sensor_count() as u32
    }

    /// Whether the HTTP API is enabled.
    #[zbus(property)]
    fn web_enabled(&self) -> bool {
        self.state.is_web_enabled()
    }

    /// Seconds since the daemon started.
    #[zbus(property)]
    fn uptime(&self) -> u64 {
        self.state.uptime_secs()
    }
}

/// Connects to the appropriate D-Bus bus based on configuration.
async fn connect_to_bus(bus_type: DbusBusType) -> anyhow::Result<(Connection, &'static str)> {
    match bus_type {
        DbusBusType::Session => {
            let conn = Connection::session()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to connect to session bus: {}", e))?;
            Ok((conn, "session"))
        }
        DbusBusType::System => {
            let conn = Connection::system()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to connect to system bus: {}", e))?;
            Ok((conn, "system"))
        }
        DbusBusType::Auto => match Connection::session().await {
            Ok(conn) => Ok((conn, "session")),
            Err(session_err) => {
                warn!(
                    "Session bus unavailable ({}), trying system bus",
                    session_err
                );
                let conn = Connection::system().await.map_err(|system_err| {
                    anyhow::anyhow!(
                        "Failed to connect to any D-Bus: session={}, system={}",
                        session_err,
                        system_err
                    )
                })?;
                Ok((conn, "system"))
            }
        },
    }
}

/// Runs the D-Bus server.
pub async fn run_dbus_server(
    state: Arc<AppState>,
    shutdown_tx: tokio::sync::mpsc::Sender<()>,
    bus_type: DbusBusType,
) -> anyhow::Result<Connection> {
    let interface = Daemon1Interface::new(state, shutdown_tx);

    let (connection, bus_name) = connect_to_bus(bus_type).await?;

    connection
        .object_server()
        .at(OBJECT_PATH, interface)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to register object: {}", e))?;

    connection
        .request_name(SERVICE_NAME)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to request bus name: {}", e))?;

    info!(
        "D-Bus service registered at {} on {} bus",
        SERVICE_NAME, bus_name
    );
    Ok(connection)
}
