//! In-process loopback transport
//!
//! Each connection is an unbounded channel. Useful for spectators living in
//! the same process as the host and for exercising broadcasters in tests.

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use holosync_core::ConnectionId;

use crate::Transport;

/// Receiving end of a loopback connection
pub type MemoryReceiver = mpsc::UnboundedReceiver<Bytes>;

#[derive(Default)]
struct MemoryState {
    peers: HashMap<ConnectionId, mpsc::UnboundedSender<Bytes>>,
    next_id: u64,
}

/// Loopback transport
#[derive(Default)]
pub struct MemoryTransport {
    state: Mutex<MemoryState>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        MemoryTransport::default()
    }

    /// Open a connection and hand back its receiving end
    pub fn open(&self) -> (ConnectionId, MemoryReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = ConnectionId::new(state.next_id);
        state.peers.insert(id, tx);
        (id, rx)
    }

    /// Close a connection; its receiver sees the channel end
    pub fn close(&self, id: ConnectionId) -> bool {
        self.state.lock().peers.remove(&id).is_some()
    }

    /// Number of open connections
    pub fn connection_count(&self) -> usize {
        self.state.lock().peers.len()
    }
}

impl Transport for MemoryTransport {
    fn send(&self, connections: &[ConnectionId], bytes: &[u8]) {
        if connections.is_empty() {
            return;
        }

        let payload = Bytes::copy_from_slice(bytes);
        let mut state = self.state.lock();
        for id in connections {
            let delivered = match state.peers.get(id) {
                Some(tx) => tx.send(payload.clone()).is_ok(),
                None => {
                    tracing::debug!(connection = %id, "Send to unknown connection skipped");
                    continue;
                }
            };

            if !delivered {
                tracing::debug!(connection = %id, "Receiver dropped, closing connection");
                state.peers.remove(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_to_selected_connections() {
        let transport = MemoryTransport::new();
        let (a, mut rx_a) = transport.open();
        let (_b, mut rx_b) = transport.open();

        transport.send(&[a], &[1, 2, 3]);

        assert_eq!(rx_a.try_recv().unwrap(), Bytes::from_static(&[1, 2, 3]));
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_dropped_receiver_is_pruned() {
        let transport = MemoryTransport::new();
        let (a, rx_a) = transport.open();
        drop(rx_a);

        transport.send(&[a], &[9]);
        assert_eq!(transport.connection_count(), 0);
    }

    #[test]
    fn test_close_ends_channel() {
        let transport = MemoryTransport::new();
        let (a, mut rx_a) = transport.open();

        assert!(transport.close(a));
        assert!(!transport.close(a));
        assert!(matches!(
            rx_a.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }
}
