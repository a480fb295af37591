//! Serial display link.
//!
//! The display unit hangs off a line-oriented UART. Failure to open the
//! device is fatal at startup; everything after that is best-effort:
//! write failures are logged and the affected push is lost (the next
//! periodic broadcast re-syncs the display), and unreadable lines are
//! dropped by the driver.

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    sync::mpsc,
};
use tokio_serial::SerialPortBuilderExt;

use sigbridge_proto::DisplayRecord;

use crate::{driver::BridgeEvent, error::BridgeError};

/// Write half of the display link. Generic over the writer so tests can
/// capture output without a UART.
pub struct DisplayLink<W> {
    writer: W,
}

/// Production link type over the serial device.
pub type SerialDisplayLink = DisplayLink<tokio::io::WriteHalf<tokio_serial::SerialStream>>;

impl SerialDisplayLink {
    /// Open the serial device and spawn the line-reader task.
    pub fn open(
        device: &str,
        baud: u32,
        events: mpsc::Sender<BridgeEvent>,
    ) -> Result<Self, BridgeError> {
        let stream = tokio_serial::new(device, baud)
            .open_native_async()
            .map_err(|e| BridgeError::DisplayLink(format!("cannot open '{device}': {e}")))?;

        tracing::info!(device, baud, "display link opened");

        let (reader, writer) = tokio::io::split(stream);
        spawn_reader(reader, events);
        Ok(Self { writer })
    }
}

impl<W: AsyncWrite + Unpin> DisplayLink<W> {
    /// Wrap an arbitrary writer (tests).
    pub fn from_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Write one record as a newline-terminated line.
    ///
    /// Failures are logged, never escalated.
    pub async fn push(&mut self, record: &DisplayRecord) {
        let line = match record.to_line() {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!(%err, "unencodable display record dropped");
                return;
            },
        };

        if let Err(err) = self.writer.write_all(line.as_bytes()).await {
            tracing::warn!(%err, "display write failed");
        }
    }

    /// Consume the link, returning the writer (tests).
    pub fn into_writer(self) -> W {
        self.writer
    }
}

/// Spawn the task that turns inbound lines into driver events.
pub fn spawn_reader<R>(reader: R, events: mpsc::Sender<BridgeEvent>) -> tokio::task::JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if events.send(BridgeEvent::DisplayLine(line)).await.is_err() {
                        return;
                    }
                },
                Ok(None) => {
                    tracing::warn!("display link closed");
                    return;
                },
                Err(err) => {
                    // Likely a partial/invalid UTF-8 line; skip it.
                    tracing::warn!(%err, "display read error");
                },
            }
        }
    })
}
