//! Sigbridge production runtime.
//!
//! Mediates one canonical signal table between three actors: a serial
//! display unit, a real-time coprocessor behind MessagePack-RPC, and
//! N network clients speaking a signed 14-byte UDP protocol.
//!
//! # Architecture
//!
//! [`BridgeDriver`] is the pure arbitration core: it consumes
//! [`BridgeEvent`]s and returns [`BridgeAction`]s, owning the registry
//! and all gating rules but doing no I/O. [`Bridge`] is the production
//! glue: it spawns the UDP listener and serial reader tasks (both feed
//! one mpsc channel), drives the poll/broadcast cadences, and executes
//! the driver's actions against the real socket, serial port, and RPC
//! client — in order, so propagation for one accepted write always
//! completes before the next event is consumed.

mod display_link;
mod driver;
mod error;
mod net;
mod rpc;
mod system_env;

use std::{path::PathBuf, time::Duration};

pub use display_link::{DisplayLink, SerialDisplayLink, spawn_reader};
pub use driver::{BridgeAction, BridgeDriver, BridgeEvent};
pub use error::BridgeError;
pub use net::UdpTransport;
pub use rpc::{CoprocessorClient, RetryPolicy, RpcError};
use sigbridge_core::{BridgeConfig, SignalRegistry};
use sigbridge_proto::{DisplayRecord, SignKey};
pub use system_env::SystemEnv;
use tokio::sync::mpsc;

/// Runtime configuration: endpoints and cadences.
///
/// Defaults match the deployed carrier-board installation; everything is
/// overridable from the command line.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Path to the signal-table configuration file.
    pub config_path: PathBuf,
    /// UDP listen address.
    pub udp_bind: String,
    /// Serial device of the display link.
    pub serial_device: String,
    /// Serial baud rate.
    pub baud: u32,
    /// Coprocessor RPC proxy address.
    pub rpc_addr: String,
    /// Telemetry poll cadence (~20 Hz).
    pub poll_interval: Duration,
    /// Full-table broadcast cadence (~5 Hz).
    pub broadcast_interval: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("config.json"),
            udp_bind: "0.0.0.0:17751".to_string(),
            serial_device: "/dev/ttymxc1".to_string(),
            baud: 115_200,
            rpc_addr: "m4-proxy:5001".to_string(),
            poll_interval: Duration::from_millis(50),
            broadcast_interval: Duration::from_millis(200),
        }
    }
}

/// The assembled production bridge.
pub struct Bridge {
    driver: BridgeDriver<SystemEnv>,
    display: SerialDisplayLink,
    udp: UdpTransport,
    rpc: CoprocessorClient,
    events_tx: mpsc::Sender<BridgeEvent>,
    events_rx: mpsc::Receiver<BridgeEvent>,
    display_config: Option<serde_json::Value>,
    config: RuntimeConfig,
}

impl Bridge {
    /// Load configuration and open every channel.
    ///
    /// Fails (fatally, by design) on an unloadable signal table, an
    /// unbindable UDP socket, or an unopenable serial device.
    pub async fn start(config: RuntimeConfig, key: SignKey) -> Result<Self, BridgeError> {
        let file = BridgeConfig::load(&config.config_path)?;
        let registry = SignalRegistry::from_config(&file)?;

        let (events_tx, events_rx) = mpsc::channel(256);

        let udp = UdpTransport::bind(&config.udp_bind).await?;
        udp.spawn_listener(events_tx.clone());

        let display =
            SerialDisplayLink::open(&config.serial_device, config.baud, events_tx.clone())?;

        let rpc = CoprocessorClient::new(config.rpc_addr.clone());
        let driver = BridgeDriver::new(registry, key, SystemEnv::new());

        Ok(Self {
            driver,
            display,
            udp,
            rpc,
            events_tx,
            events_rx,
            display_config: file.display_config,
            config,
        })
    }

    /// Run until interrupted.
    pub async fn run(mut self) -> Result<(), BridgeError> {
        tracing::info!(
            signals = self.driver.registry().len(),
            mode = self.driver.registry().mode().as_str(),
            "bridge running"
        );

        if let Some(payload) = self.display_config.take() {
            self.display.push(&DisplayRecord::Config(payload)).await;
        }

        let mut poll = tokio::time::interval(self.config.poll_interval);
        let mut broadcast = tokio::time::interval(self.config.broadcast_interval);
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        broadcast.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            let event = tokio::select! {
                Some(event) = self.events_rx.recv() => event,
                _ = poll.tick() => BridgeEvent::PollDue,
                _ = broadcast.tick() => BridgeEvent::BroadcastDue,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("interrupt received, shutting down");
                    break;
                },
            };

            let actions = self.driver.process_event(event);
            self.execute_actions(actions).await;
        }

        // Dropping self releases the serial handle and the socket.
        Ok(())
    }

    /// Execute driver actions, in order.
    async fn execute_actions(&mut self, actions: Vec<BridgeAction>) {
        for action in actions {
            match action {
                BridgeAction::PushDisplay(record) => {
                    self.display.push(&record).await;
                },

                BridgeAction::BroadcastFrame(frame) => {
                    self.udp.broadcast(&frame).await;
                },

                BridgeAction::CallSetter { function, value } => {
                    // Optimistic write: the registry was already updated;
                    // a failed setter only means the next telemetry poll
                    // may walk the value back.
                    if let Err(err) = self.rpc.call_setter(&function, value).await {
                        tracing::warn!(function, %err, "setter call failed; local value stands");
                    }
                },

                BridgeAction::PollCoprocessor => {
                    match self.rpc.poll_word().await {
                        Ok(word) => {
                            // Feed the word back through the event channel
                            // instead of recursing into the driver here.
                            if self
                                .events_tx
                                .try_send(BridgeEvent::TelemetryWord(word))
                                .is_err()
                            {
                                tracing::warn!("event channel full, telemetry word dropped");
                            }
                        },
                        Err(err) => {
                            tracing::debug!(%err, "telemetry poll failed");
                        },
                    }
                },
            }
        }
    }
}
