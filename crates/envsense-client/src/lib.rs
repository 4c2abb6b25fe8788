//! D-Bus client library for communicating with the envsense daemon.

use anyhow::{Context, Result};
use tracing::debug;
use zbus::{proxy, Connection};

/// Well-known bus name of the daemon.
pub const SERVICE_NAME: &str = "org.envsense.Daemon";

/// D-Bus bus type selection.
#[derive(Debug, Clone, Copy, Default)]
pub enum BusType {
    /// Session bus (user session).
    Session,
    /// System bus (system-wide).
    System,
    /// Try session first, fall back to system.
    #[default]
    Auto,
}

/// D-Bus proxy for the envsense daemon.
#[proxy(
    interface = "org.envsense.Daemon1",
    default_service = "org.envsense.Daemon",
    default_path = "/org/envsense/Daemon"
)]
trait Daemon1 {
    /// Lists configured sensor ids.
    fn list_sensors(&self) -> zbus::Result<Vec<String>>;

    /// Returns the latest reading of a sensor as JSON.
    fn read_sensor(&self, id: &str) -> zbus::Result<String>;

    /// Shuts down the daemon.
    fn quit(&self) -> zbus::Result<()>;

    /// Number of configured sensors.
    #[zbus(property)]
    fn sensor_count(&self) -> zbus::Result<u32>;

    /// Whether the HTTP API is enabled.
    #[zbus(property)]
    fn web_enabled(&self) -> zbus::Result<bool>;

    /// Seconds since the daemon started.
    #[zbus(property)]
    fn uptime(&self) -> zbus::Result<u64>;
}

/// D-Bus client wrapper for the daemon.
pub struct DaemonClient {
    proxy: Daemon1Proxy<'static>,
}

impl DaemonClient {
    /// Attempts to connect to the daemon via D-Bus with auto bus detection.
    pub async fn connect() -> Result<Self> {
        Self::connect_with_bus(BusType::Auto).await
    }

    /// Attempts to connect to the daemon via D-Bus with specified bus type.
    pub async fn connect_with_bus(bus_type: BusType) -> Result<Self> {
        let connection = match bus_type {
            BusType::Session => {
                debug!("Connecting to session bus");
                Connection::session()
                    .await
                    .context("Failed to connect to session bus")?
            }
            BusType::System => {
                debug!("Connecting to system bus");
                Connection::system()
                    .await
                    .context("Failed to connect to system bus")?
            }
            BusType::Auto => Self::connect_auto().await?,
        };

        let proxy = Daemon1Proxy::new(&connection)
            .await
            .context("Failed to create D-Bus proxy")?;

        Ok(Self { proxy })
    }

    /// Finds the bus the daemon is registered on, session first.
    async fn connect_auto() -> Result<Connection> {
        if let Ok(conn) = Connection::session().await {
            debug!("Connected to session bus, checking for daemon service");
            if Self::service_exists(&conn).await {
                debug!("Found daemon on session bus");
                return Ok(conn);
            }
            debug!("Daemon not on session bus, trying system bus");
        } else {
            debug!("Session bus unavailable, trying system bus");
        }

        let conn = Connection::system()
            .await
            .context("Failed to connect to system bus")?;
        if !Self::service_exists(&conn).await {
            anyhow::bail!(
                "Daemon service not found on session or system bus. Is envsensed running?"
            );
        }
        debug!("Found daemon on system bus");
        Ok(conn)
    }

    /// Checks if the daemon service exists on the given connection.
    async fn service_exists(conn: &Connection) -> bool {
        use zbus::fdo::DBusProxy;
        use zbus::names::BusName;
        let Ok(name) = BusName::try_from(SERVICE_NAME) else {
            return false;
        };
        match DBusProxy::new(conn).await {
            Ok(dbus_proxy) => dbus_proxy.name_has_owner(name).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Lists configured sensor ids.
    pub async fn list_sensors(&self) -> Result<Vec<String>> {
        self.proxy
            .list_sensors()
            .await
            .context("Failed to list sensors via D-Bus")
    }

    /// Returns the latest reading of a sensor as JSON.
    pub async fn read_sensor(&self, id: &str) -> Result<String> {
        self.proxy
            .read_sensor(id)
            .await
            .with_context(|| format!("Failed to read sensor '{}' via D-Bus", id))
    }

    /// Shuts down the daemon.
    pub async fn quit(&self) -> Result<()> {
        self.proxy
            .quit()
            .await
            .context("Failed to quit daemon via D-Bus")
    }

    /// Returns the number of configured sensors.
    pub async fn sensor_count(&self) -> Result<u32> {
        self.proxy
            .sensor_count()
            .await
            .context("Failed to get sensor count via D-Bus")
    }

    /// Checks if the HTTP API is enabled.
    pub async fn is_web_enabled(&self) -> Result<bool> {
        self.proxy
            .web_enabled()
            .await
            .context("Failed to get web enabled status via D-Bus")
    }

    /// Returns the daemon uptime in seconds.
    pub async fn uptime(&self) -> Result<u64> {
        self.proxy
            .uptime()
            .await
            .context("Failed to get uptime via D-Bus")
    }
}
