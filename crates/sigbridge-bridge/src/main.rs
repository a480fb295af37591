//! Sigbridge bridge binary.
//!
//! # Usage
//!
//! ```bash
//! # Deployed defaults (carrier-board installation)
//! sigbridge-bridge --config config.json
//!
//! # Bench setup with a USB serial adapter and a local coprocessor proxy
//! sigbridge-bridge --config bench.json --serial-device /dev/ttyUSB0 \
//!     --rpc-addr 127.0.0.1:5001
//! ```

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use sigbridge_bridge::{Bridge, RuntimeConfig};
use sigbridge_proto::SignKey;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Carrier-board signal bridge
#[derive(Parser, Debug)]
#[command(name = "sigbridge-bridge")]
#[command(about = "Carrier-board signal synchronization bridge")]
#[command(version)]
struct Args {
    /// Path to the signal-table configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// UDP listen address
    #[arg(long, default_value = "0.0.0.0:17751")]
    udp_bind: String,

    /// Serial device of the display link
    #[arg(long, default_value = "/dev/ttymxc1")]
    serial_device: String,

    /// Serial baud rate
    #[arg(long, default_value = "115200")]
    baud: u32,

    /// Coprocessor RPC proxy address
    #[arg(long, default_value = "m4-proxy:5001")]
    rpc_addr: String,

    /// Telemetry poll interval in milliseconds
    #[arg(long, default_value = "50")]
    poll_interval_ms: u64,

    /// Full-table broadcast interval in milliseconds
    #[arg(long, default_value = "200")]
    broadcast_interval_ms: u64,

    /// Frame signing key (256 hex characters); built-in key when omitted
    #[arg(long)]
    sign_key: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("sigbridge starting");

    let key = match &args.sign_key {
        Some(hex) => SignKey::from_hex(hex)?,
        None => SignKey::default(),
    };

    let config = RuntimeConfig {
        config_path: args.config,
        udp_bind: args.udp_bind,
        serial_device: args.serial_device,
        baud: args.baud,
        rpc_addr: args.rpc_addr,
        poll_interval: Duration::from_millis(args.poll_interval_ms),
        broadcast_interval: Duration::from_millis(args.broadcast_interval_ms),
    };

    let bridge = Bridge::start(config, key).await?;

    bridge.run().await?;

    Ok(())
}
