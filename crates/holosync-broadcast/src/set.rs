//! Per-tick dispatch over many broadcasters
//!
//! Each tick, for every broadcaster:
//! 1. Newly added broadcasters send complete state to every connection
//! 2. Otherwise deltas go to established connections
//! 3. Connections that joined since the last tick get complete state
//!
//! Joined connections become established once the tick finishes.

use std::collections::BTreeSet;
use std::sync::Arc;

use holosync_core::{ComponentId, ConnectionId, HoloError, HoloResult, ServiceId};
use holosync_transport::Transport;
use holosync_wire::MessageHeader;

use crate::ComponentBroadcaster;

/// Object-safe view of a broadcaster, erasing its flag type
trait DynBroadcaster: Send {
    fn key(&self) -> (ServiceId, ComponentId);

    fn tick(
        &mut self,
        transport: &dyn Transport,
        established: &[ConnectionId],
        joined: &[ConnectionId],
        stats: &mut TickStats,
    );

    /// Returns the encoded message length
    fn send_complete(&mut self, transport: &dyn Transport, connections: &[ConnectionId]) -> usize;
}

impl<B: ComponentBroadcaster> DynBroadcaster for B {
    fn key(&self) -> (ServiceId, ComponentId) {
        (self.service_id(), self.component_id())
    }

    fn tick(
        &mut self,
        transport: &dyn Transport,
        established: &[ConnectionId],
        joined: &[ConnectionId],
        stats: &mut TickStats,
    ) {
        let flags = self.calculate_delta_changes();
        if self.has_changes(flags) && !established.is_empty() {
            let message = self.send_delta_changes(transport, established, flags);
            stats.delta_messages += 1;
            stats.bytes_sent += (message.len() * established.len()) as u64;
        }

        if !joined.is_empty() {
            let message = self.send_complete_changes(transport, joined);
            stats.complete_messages += 1;
            stats.bytes_sent += (message.len() * joined.len()) as u64;
        }
    }

    fn send_complete(&mut self, transport: &dyn Transport, connections: &[ConnectionId]) -> usize {
        self.send_complete_changes(transport, connections).len()
    }
}

struct Entry {
    broadcaster: Box<dyn DynBroadcaster>,
    fresh: bool,
}

/// Counters for one tick
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    pub delta_messages: u64,
    pub complete_messages: u64,
    pub removed_messages: u64,
    pub bytes_sent: u64,
}

impl TickStats {
    pub fn messages(&self) -> u64 {
        self.delta_messages + self.complete_messages + self.removed_messages
    }
}

/// The broadcasters of one host and the connections they serve
pub struct BroadcasterSet {
    transport: Arc<dyn Transport>,
    entries: Vec<Entry>,
    established: BTreeSet<ConnectionId>,
    joined: BTreeSet<ConnectionId>,
    pending_removals: Vec<(ServiceId, ComponentId)>,
}

impl BroadcasterSet {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        BroadcasterSet {
            transport,
            entries: Vec::new(),
            established: BTreeSet::new(),
            joined: BTreeSet::new(),
            pending_removals: Vec::new(),
        }
    }

    /// Start tracking a component; it is sent in full on the next tick
    pub fn add<B>(&mut self, broadcaster: B) -> HoloResult<()>
    where
        B: ComponentBroadcaster + 'static,
    {
        let key = (broadcaster.service_id(), broadcaster.component_id());
        if self.entries.iter().any(|e| e.broadcaster.key() == key) {
            return Err(HoloError::DuplicateComponent(key.1));
        }

        tracing::debug!(service = %key.0, component = %key.1, "Broadcaster added");
        self.pending_removals.retain(|k| *k != key);
        self.entries.push(Entry {
            broadcaster: Box::new(broadcaster),
            fresh: true,
        });
        Ok(())
    }

    /// Stop tracking a component; peers are told on the next tick
    pub fn remove(&mut self, service: ServiceId, component: ComponentId) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|e| e.broadcaster.key() != (service, component));

        let removed = self.entries.len() != before;
        if removed {
            tracing::debug!(service = %service, component = %component, "Broadcaster removed");
            self.pending_removals.push((service, component));
        }
        removed
    }

    /// A peer connected; it receives complete state on the next tick
    ///
    /// Returns false if the peer was already connected.
    pub fn connect(&mut self, connection: ConnectionId) -> bool {
        let added = !self.established.contains(&connection) && self.joined.insert(connection);
        if added {
            tracing::info!(connection = %connection, "Spectator joined");
        }
        added
    }

    /// Returns false if the peer was not connected
    pub fn disconnect(&mut self, connection: ConnectionId) -> bool {
        let was_known = self.established.remove(&connection) | self.joined.remove(&connection);
        if was_known {
            tracing::info!(connection = %connection, "Spectator left");
        }
        was_known
    }

    /// Send complete state of every component to one connection right away
    pub fn resync(&mut self, connection: ConnectionId) {
        let transport = Arc::clone(&self.transport);
        for entry in &mut self.entries {
            entry.broadcaster.send_complete(transport.as_ref(), &[connection]);
            entry.fresh = false;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn connection_count(&self) -> usize {
        self.established.len() + self.joined.len()
    }

    /// Run one synchronization pass
    pub fn tick(&mut self) -> TickStats {
        let mut stats = TickStats::default();
        let transport = Arc::clone(&self.transport);
        let established: Vec<ConnectionId> = self.established.iter().copied().collect();
        let joined: Vec<ConnectionId> = self.joined.iter().copied().collect();
        let everyone: Vec<ConnectionId> = established.iter().chain(joined.iter()).copied().collect();

        for (service, component) in self.pending_removals.drain(..) {
            if established.is_empty() {
                continue;
            }
            let header = MessageHeader::removed(service, component).to_bytes();
            transport.send(&established, &header);
            stats.removed_messages += 1;
            stats.bytes_sent += (header.len() * established.len()) as u64;
        }

        for entry in &mut self.entries {
            if entry.fresh {
                if !everyone.is_empty() {
                    let len = entry.broadcaster.send_complete(transport.as_ref(), &everyone);
                    stats.complete_messages += 1;
                    stats.bytes_sent += (len * everyone.len()) as u64;
                    entry.fresh = false;
                }
                continue;
            }

            entry
                .broadcaster
                .tick(transport.as_ref(), &established, &joined, &mut stats);
        }

        self.established.append(&mut self.joined);

        if stats.messages() > 0 {
            tracing::debug!(
                deltas = stats.delta_messages,
                completes = stats.complete_messages,
                removed = stats.removed_messages,
                bytes = stats.bytes_sent,
                "Broadcast tick"
            );
        }
        stats
    }
}
