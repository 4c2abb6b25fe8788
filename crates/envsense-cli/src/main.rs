//! envsense control tool
//!
//! CLI for querying the envsense daemon via D-Bus.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use envsense_client::{BusType, DaemonClient};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum CliBusType {
    /// Try session bus first, fall back to system bus
    #[default]
    Auto,
    /// Use session bus (for user services)
    Session,
    /// Use system bus (for system services)
    System,
}

impl From<CliBusType> for BusType {
    fn from(bus: CliBusType) -> Self {
        match bus {
            CliBusType::Auto => BusType::Auto,
            CliBusType::Session => BusType::Session,
            CliBusType::System => BusType::System,
        }
    }
}

#[derive(Parser)]
#[command(name = "envsensectl")]
#[command(about = "Control tool for the envsense daemon")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// D-Bus bus type to use
    #[arg(long, default_value = "auto", value_enum)]
    bus: CliBusType,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sensor commands
    Sensors {
        #[command(subcommand)]
        action: SensorCommands,
    },
    /// Daemon control commands
    Daemon {
        #[command(subcommand)]
        action: DaemonCommands,
    },
}

#[derive(Subcommand)]
enum SensorCommands {
    /// List configured sensors
    List,
    /// Show the latest samples of a sensor
    Read {
        /// Sensor id (e.g., pm25, dht22, mq7, gps)
        id: String,

        /// Print the raw JSON reading
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum DaemonCommands {
    /// Check if daemon is running
    Status,
    /// Request daemon shutdown
    Quit,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Connect to daemon
    let client = DaemonClient::connect_with_bus(cli.bus.into())
        .await
        .context("Failed to connect to daemon. Is envsensed running?")?;

    match cli.command {
        Commands::Sensors { action } => handle_sensors(action, &client).await,
        Commands::Daemon { action } => handle_daemon(action, &client).await,
    }
}

async fn handle_sensors(action: SensorCommands, client: &DaemonClient) -> Result<()> {
    match action {
        SensorCommands::List => {
            let sensors = client.list_sensors().await?;
            println!("Configured sensors:");
            for id in sensors {
                println!("  {}", id);
            }
        }
        SensorCommands::Read { id, json } => {
            let raw = client.read_sensor(&id).await?;
            if json {
                println!("{}", raw);
            } else {
                let reading: Value =
                    serde_json::from_str(&raw).context("Daemon returned invalid JSON")?;
                print!("{}", format_reading(&reading));
            }
        }
    }

    Ok(())
}

async fn handle_daemon(action: DaemonCommands, client: &DaemonClient) -> Result<()> {
    match action {
        DaemonCommands::Status => {
            let sensors = client.sensor_count().await?;
            let web = client.is_web_enabled().await?;
            let uptime = client.uptime().await?;
            println!("Daemon: running");
            println!("Uptime: {}", format_uptime(uptime));
            println!("Sensors: {}", sensors);
            println!("HTTP API: {}", if web { "enabled" } else { "disabled" });
        }
        DaemonCommands::Quit => {
            client.quit().await?;
            println!("Shutdown request sent to daemon");
        }
    }

    Ok(())
}

/// Renders a sensor reading for humans.
fn format_reading(reading: &Value) -> String {
    let mut out = String::new();
    let id = reading["id"].as_str().unwrap_or("?");
    let kind = reading["kind"].as_str().unwrap_or("?");
    out.push_str(&format!("Sensor {} ({})\n", id, kind));

    let age = match reading["age_seconds"].as_f64() {
        Some(age) => format!("{:.1}s ago", age),
        None => "no data yet".to_string(),
    };
    out.push_str(&format!("  Last sample: {}\n", age));

    if reading["faulted"].as_bool().unwrap_or(false) {
        out.push_str(&format!(
            "  Status: faulted ({} in a row: {})\n",
            reading["consecutive_faults"],
            reading["last_fault"].as_str().unwrap_or("unknown")
        ));
    } else {
        out.push_str("  Status: ok\n");
    }

    let samples = reading["samples"].as_array().map(Vec::as_slice).unwrap_or(&[]);
    out.push_str(&format!("  Samples ({}):\n", samples.len()));
    for sample in samples {
        out.push_str(&format!("    {}\n", format_sample(sample)));
    }
    out
}

/// Renders one sample by its shape.
fn format_sample(sample: &Value) -> String {
    if let Some(value) = sample.as_f64() {
        return format!("{:.3}", value);
    }
    if let (Some(pm2_5), Some(pm10)) = (sample["pm2_5"].as_f64(), sample["pm10"].as_f64()) {
        return format!("PM2.5 {:.1} µg/m³, PM10 {:.1} µg/m³", pm2_5, pm10);
    }
    if let (Some(c), Some(f), Some(h)) = (
        sample["temperature_c"].as_f64(),
        sample["temperature_f"].as_f64(),
        sample["humidity"].as_f64(),
    ) {
        return format!("{:.1}°C / {:.1}°F, {:.1}% RH", c, f, h);
    }
    if let (Some(lat), Some(lon)) = (sample["latitude"].as_f64(), sample["longitude"].as_f64()) {
        return format!("{:.6}, {:.6}", lat, lon);
    }
    sample.to_string()
}

fn format_uptime(secs: u64) -> String {
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;
    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m {}s", minutes, secs % 60)
    }
}
