//! NaviStick command-line client

use clap::{Parser, Subcommand};
use navistick::config::ClientConfig;
use navistick::observability::init_default_logging;
use navistick::{listener, ConnectionStatus, DeviceClient, DeviceEvent, EventCategory};
use std::path::PathBuf;
use std::process;
use tokio::signal;
use tracing::{error, info, warn};

/// Talk to a NaviStick smart cane on the local network
#[derive(Parser)]
#[command(name = "navistick")]
#[command(about = "NaviStick smart cane connectivity client")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Device host, overrides the configured one
    #[arg(long, env = "NAVISTICK_HOST")]
    host: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream telemetry and log every event until Ctrl-C
    Monitor,
    /// Print the device status report
    Status,
    /// Connectivity self-test
    Probe,
    /// Run a vibration pattern
    Vibrate {
        #[arg(long, default_value = "pulse")]
        pattern: String,
        /// 0-100, out of range values are clamped
        #[arg(long, default_value_t = 100, allow_negative_numbers = true)]
        intensity: i64,
    },
    /// Select the default vibrator pattern
    Pattern { pattern: String },
    /// Ask the device to calibrate its sensors
    Calibrate,
    /// Validate configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!("Starting navistick v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };
    if let Some(host) = cli.host {
        config.device.host = host;
    }

    let result = run_command(&config, cli.command).await;

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<ClientConfig, Box<dyn std::error::Error>> {
    let path = match config_path {
        Some(path) => Some(path.clone()),
        None => ClientConfig::find_default_file(),
    };

    match path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(ClientConfig::load_from_file(&path)?)
        }
        None => {
            info!("No configuration file found, using defaults");
            Ok(ClientConfig::default())
        }
    }
}

fn handle_config_command(
    config: &ClientConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;
    if show {
        println!("{}", toml::to_string_pretty(config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}

async fn run_command(
    config: &ClientConfig,
    command: Commands,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = DeviceClient::new(config)?;

    match command {
        Commands::Config { show } => handle_config_command(config, show)?,
        Commands::Monitor => monitor(&client).await?,
        Commands::Status => print_json(&client.get_system_status().await?)?,
        Commands::Probe => {
            client.probe().await?;
            info!(endpoint = %client.endpoint(), "Command surface reachable");
            print_json(&client.get_system_status().await?)?;
        }
        Commands::Vibrate { pattern, intensity } => {
            print_json(&client.activate_vibration(&pattern, intensity).await?)?
        }
        Commands::Pattern { pattern } => {
            print_json(&client.set_vibrator_pattern(&pattern).await?)?
        }
        Commands::Calibrate => print_json(&client.calibrate_sensors().await?)?,
    }

    Ok(())
}

async fn monitor(client: &DeviceClient) -> Result<(), Box<dyn std::error::Error>> {
    let printer = listener(|event: &DeviceEvent| {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(error = %e, "Could not serialize event"),
        }
        Ok(())
    });
    for category in EventCategory::ALL {
        client.subscribe(category, printer.clone());
    }

    let mut status = client.status_watch();
    client.connect();
    info!(endpoint = %client.endpoint(), "Monitoring device stream");

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received Ctrl-C, shutting down");
        }
        _ = status.wait_for(|s| *s == ConnectionStatus::Failed) => {
            error!("Device unreachable, reconnection attempts exhausted");
        }
    }

    client.disconnect();
    print_json(&client.metrics())?;
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
