//! UDP transport and the learned client set.
//!
//! Network clients are never configured: any address that sends us a
//! datagram — valid or not — is learned into the broadcast fan-out set.
//! Learning is deliberately independent of signature verification because
//! the set is only used for reply routing, never for authorization; a
//! client with a bad key receives broadcasts it cannot forge writes with.
//! The set grows monotonically for the life of the process.

use std::{collections::HashSet, net::SocketAddr, sync::Arc};

use tokio::{net::UdpSocket, sync::RwLock, sync::mpsc};

use crate::{driver::BridgeEvent, error::BridgeError};

/// Receive buffer size; real frames are 14 bytes, anything longer is
/// passed through whole so the driver can reject it by length.
const RECV_BUF: usize = 1024;

/// Bound UDP socket plus the learned client set.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<HashSet<SocketAddr>>>,
}

impl UdpTransport {
    /// Bind the listening socket.
    pub async fn bind(addr: &str) -> Result<Self, BridgeError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| BridgeError::Transport(format!("cannot bind UDP socket '{addr}': {e}")))?;

        tracing::info!(addr, "UDP transport bound");
        Ok(Self { socket: Arc::new(socket), clients: Arc::new(RwLock::new(HashSet::new())) })
    }

    /// Local address the socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, BridgeError> {
        self.socket
            .local_addr()
            .map_err(|e| BridgeError::Transport(format!("no local address: {e}")))
    }

    /// Spawn the continuous receive loop.
    ///
    /// Every datagram learns its sender and is forwarded to the driver
    /// unvalidated; receive errors are logged and the loop continues.
    pub fn spawn_listener(&self, events: mpsc::Sender<BridgeEvent>) -> tokio::task::JoinHandle<()> {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);

        tokio::spawn(async move {
            let mut buf = vec![0u8; RECV_BUF];
            loop {
                match socket.recv_from(&mut buf).await {
                    Ok((len, addr)) => {
                        if clients.write().await.insert(addr) {
                            tracing::info!(%addr, "learned network client");
                        }
                        if events.send(BridgeEvent::Datagram(buf[..len].to_vec())).await.is_err() {
                            // Owner task gone; nothing left to feed.
                            return;
                        }
                    },
                    Err(err) => {
                        tracing::warn!(%err, "UDP receive error");
                        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                    },
                }
            }
        })
    }

    /// Send one encoded frame to every known client.
    ///
    /// Send failures are logged and skipped; the next periodic broadcast
    /// resynchronizes any client that missed this one.
    pub async fn broadcast(&self, frame: &[u8]) {
        let targets: Vec<SocketAddr> = self.clients.read().await.iter().copied().collect();
        for addr in targets {
            if let Err(err) = self.socket.send_to(frame, addr).await {
                tracing::warn!(%addr, %err, "broadcast send failed");
            }
        }
    }

    /// Number of learned clients (diagnostics, tests).
    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }
}
