//! UDP transport implementation

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use holosync_core::{ConnectionId, HoloError, HoloResult};

use crate::Transport;

/// Largest datagram we send or expect to receive (MTU-friendly)
pub const MAX_DATAGRAM_SIZE: usize = 1400;

/// UDP transport for component messages
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    peers: RwLock<HashMap<ConnectionId, SocketAddr>>,
    next_id: AtomicU64,
}

impl UdpTransport {
    /// Bind to a local address
    pub async fn bind(addr: SocketAddr) -> HoloResult<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| HoloError::TransportError(e.to_string()))?;

        let local_addr = socket
            .local_addr()
            .map_err(|e| HoloError::TransportError(e.to_string()))?;

        Ok(UdpTransport {
            socket: Arc::new(socket),
            local_addr,
            peers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    /// Get local address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Register a peer, reusing its handle if the address is already known
    pub fn connect(&self, addr: SocketAddr) -> ConnectionId {
        if let Some(id) = self.connection_for(addr) {
            return id;
        }

        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.peers.write().insert(id, addr);
        tracing::info!(connection = %id, peer = %addr, "UDP peer connected");
        id
    }

    /// Forget a peer
    pub fn disconnect(&self, id: ConnectionId) -> HoloResult<SocketAddr> {
        let addr = self
            .peers
            .write()
            .remove(&id)
            .ok_or(HoloError::UnknownConnection(id.0))?;
        tracing::info!(connection = %id, peer = %addr, "UDP peer disconnected");
        Ok(addr)
    }

    /// Look up the handle for a peer address
    pub fn connection_for(&self, addr: SocketAddr) -> Option<ConnectionId> {
        self.peers
            .read()
            .iter()
            .find(|(_, peer)| **peer == addr)
            .map(|(id, _)| *id)
    }

    /// Address of a known peer
    pub fn peer_addr(&self, id: ConnectionId) -> Option<SocketAddr> {
        self.peers.read().get(&id).copied()
    }

    /// Send raw bytes to a destination
    pub async fn send_bytes_to(&self, bytes: &[u8], dest: SocketAddr) -> HoloResult<()> {
        self.socket
            .send_to(bytes, dest)
            .await
            .map_err(|e| HoloError::TransportError(e.to_string()))?;
        Ok(())
    }

    /// Receive raw bytes (waits for the next datagram)
    pub async fn recv_bytes_from(&self) -> HoloResult<(Vec<u8>, SocketAddr)> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let (len, addr) = self
            .socket
            .recv_from(&mut buf)
            .await
            .map_err(|e| HoloError::TransportError(e.to_string()))?;

        Ok((buf[..len].to_vec(), addr))
    }

    /// Get a clone of the socket for concurrent operations
    pub fn socket(&self) -> Arc<UdpSocket> {
        Arc::clone(&self.socket)
    }
}

impl Transport for UdpTransport {
    fn send(&self, connections: &[ConnectionId], bytes: &[u8]) {
        if bytes.len() > MAX_DATAGRAM_SIZE {
            tracing::warn!(len = bytes.len(), "Dropping oversized datagram");
            return;
        }

        let peers = self.peers.read();
        for id in connections {
            let Some(addr) = peers.get(id) else {
                tracing::debug!(connection = %id, "Send to unknown connection skipped");
                continue;
            };

            if let Err(e) = self.socket.try_send_to(bytes, *addr) {
                tracing::warn!(connection = %id, peer = %addr, "UDP send error: {}", e);
            }
        }
    }
}

/// Packet receiver channel
pub type PacketReceiver = mpsc::Receiver<(Vec<u8>, SocketAddr)>;

/// Start a background receive loop
pub fn start_receive_loop(socket: Arc<UdpSocket>, buffer_size: usize) -> PacketReceiver {
    let (tx, rx) = mpsc::channel(buffer_size);

    tokio::spawn(async move {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            match socket.recv_from(&mut buf).await {
                Ok((len, addr)) => {
                    let packet = buf[..len].to_vec();
                    if tx.send((packet, addr)).await.is_err() {
                        break; // Receiver dropped
                    }
                }
                Err(e) => {
                    tracing::warn!("UDP receive error: {}", e);
                }
            }
        }
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn loopback() -> UdpTransport {
        UdpTransport::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_udp_transport_bind() {
        let transport = loopback().await;
        assert_ne!(transport.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn test_connect_is_idempotent_per_address() {
        let transport = loopback().await;
        let addr: SocketAddr = "127.0.0.1:5000".parse().unwrap();

        let first = transport.connect(addr);
        let second = transport.connect(addr);
        assert_eq!(first, second);
        assert_eq!(transport.peer_addr(first), Some(addr));

        assert_eq!(transport.disconnect(first).unwrap(), addr);
        assert!(transport.connection_for(addr).is_none());
        assert!(matches!(
            transport.disconnect(first),
            Err(HoloError::UnknownConnection(_))
        ));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_peer() {
        let host = loopback().await;
        let spectator = loopback().await;

        let conn = host.connect(spectator.local_addr());
        host.send(&[conn], b"hello");

        let (bytes, from) = spectator.recv_bytes_from().await.unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(from, host.local_addr());
    }
}
