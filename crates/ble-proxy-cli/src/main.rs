//! ble-proxy-cli - Command-line client for the BLE vehicle proxy
//!
//! Installs credentials and sends vehicle commands to a running `ble-proxyd`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use ble_proxy_client::ProxyClient;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "ble-proxy-cli")]
#[command(author, version, about = "BLE vehicle proxy CLI")]
#[command(propagate_version = true)]
struct Cli {
    /// Proxy URL
    #[arg(
        short,
        long,
        env = "BLE_PROXY_SERVER",
        default_value = "http://localhost:80"
    )]
    server: String,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install the vehicle key and VIN on the proxy
    Credentials {
        /// PEM file holding the P-256 private key
        #[arg(short, long)]
        key: PathBuf,

        /// Vehicle identification number
        #[arg(long, env = "TESLA_VIN")]
        vin: String,
    },

    /// Wake the vehicle
    Wakeup,

    /// Lock the doors
    Lock,

    /// Unlock the doors
    Unlock,

    /// Start charging
    ChargeStart,

    /// Stop charging
    ChargeStop,

    /// Set the charging current
    SetChargingAmps {
        /// Current in amps
        #[arg(allow_negative_numbers = true)]
        amps: i32,
    },

    /// Set the charge limit
    ChangeChargeLimit {
        /// Limit in percent
        #[arg(allow_negative_numbers = true)]
        percent: i32,
    },

    /// Check that the proxy is up
    Health,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Credentials { .. } => "credentials",
            Commands::Wakeup => "wakeup",
            Commands::Lock => "lock",
            Commands::Unlock => "unlock",
            Commands::ChargeStart => "charge-start",
            Commands::ChargeStop => "charge-stop",
            Commands::SetChargingAmps { .. } => "set-charging-amps",
            Commands::ChangeChargeLimit { .. } => "change-charge-limit",
            Commands::Health => "health",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    let client = ProxyClient::new(&cli.server)
        .with_context(|| format!("Invalid server URL: {}", cli.server))?;

    run(&client, &cli.command)
        .await
        .with_context(|| format!("{} failed", cli.command.name()))?;

    println!("OK");
    Ok(())
}

async fn run(client: &ProxyClient, command: &Commands) -> Result<()> {
    match command {
        Commands::Credentials { key, vin } => {
            println!("VIN: {}", vin);
            client
                .set_credentials_from_file(key, vin)
                .await
                .with_context(|| format!("Could not install key {}", key.display()))?;
        }
        Commands::Wakeup => client.wakeup().await?,
        Commands::Lock => client.lock().await?,
        Commands::Unlock => client.unlock().await?,
        Commands::ChargeStart => client.charge_start().await?,
        Commands::ChargeStop => client.charge_stop().await?,
        Commands::SetChargingAmps { amps } => client.set_charging_amps(*amps).await?,
        Commands::ChangeChargeLimit { percent } => client.change_charge_limit(*percent).await?,
        Commands::Health => {
            let body = client.health().await?;
            tracing::debug!(%body, "Health response");
        }
    }
    Ok(())
}
