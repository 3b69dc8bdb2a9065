//! Component broadcaster contract and the snapshot-based implementation

use bytes::Bytes;

use holosync_core::{ComponentId, ConnectionId, ServiceId};
use holosync_transport::Transport;
use holosync_wire::{ChangeFlags, MessageHeader, MessageWriter};

use crate::{StateSource, TrackedState};

/// Per-component change detection and wire framing
///
/// Implementors supply the comparison (`calculate_delta_changes`) and the
/// field encoding (`write_changes`); framing and dispatch are shared.
pub trait ComponentBroadcaster: Send {
    type Flags: ChangeFlags;

    fn service_id(&self) -> ServiceId;

    fn component_id(&self) -> ComponentId;

    /// Diff live state against the last observed snapshot and refresh it
    fn calculate_delta_changes(&mut self) -> Self::Flags;

    /// Write the fields of every group in `flags`, in ascending bit order
    fn write_changes(&self, writer: &mut MessageWriter, flags: Self::Flags);

    /// Called before a complete send; must leave `write_changes` encoding
    /// live state
    fn prepare_complete(&mut self) {}

    fn has_changes(&self, flags: Self::Flags) -> bool {
        !flags.is_none()
    }

    /// Frame `[header][flags][fields...]` without sending it
    fn encode_changes(&self, flags: Self::Flags) -> Bytes {
        let header = MessageHeader::delta(self.service_id(), self.component_id());
        let mut writer = MessageWriter::new(&header);
        writer.put_flags(flags);
        self.write_changes(&mut writer, flags);
        writer.freeze()
    }

    /// Send every group, whatever was sent before
    fn send_complete_changes(
        &mut self,
        transport: &dyn Transport,
        connections: &[ConnectionId],
    ) -> Bytes {
        self.prepare_complete();
        self.send_delta_changes(transport, connections, <Self::Flags as ChangeFlags>::ALL)
    }

    /// Send the groups named by `flags` to every connection
    fn send_delta_changes(
        &self,
        transport: &dyn Transport,
        connections: &[ConnectionId],
        flags: Self::Flags,
    ) -> Bytes {
        let message = self.encode_changes(flags);
        tracing::trace!(
            service = %self.service_id(),
            component = %self.component_id(),
            flags = flags.bits(),
            len = message.len(),
            peers = connections.len(),
            "Broadcasting component changes"
        );
        transport.send(connections, &message);
        message
    }
}

/// Broadcaster for any `TrackedState` read from a `StateSource`
///
/// The cached snapshot is what remote peers were last told. It is replaced
/// wholesale whenever any group differs. A complete send refreshes it from
/// live state; groups that changed in the process are held back and
/// reported by the next `calculate_delta_changes`, so peers that only get
/// deltas still see them.
pub struct StateBroadcaster<Src: StateSource> {
    component: ComponentId,
    source: Src,
    snapshot: Option<Src::State>,
    unreported: <Src::State as TrackedState>::Flags,
}

impl<Src: StateSource> StateBroadcaster<Src> {
    pub fn new(component: ComponentId, source: Src) -> Self {
        StateBroadcaster {
            component,
            source,
            snapshot: None,
            unreported: <<Src::State as TrackedState>::Flags as ChangeFlags>::NONE,
        }
    }

    /// Last value peers were told about
    pub fn snapshot(&self) -> Option<Src::State> {
        self.snapshot
    }

    pub fn source(&self) -> &Src {
        &self.source
    }

    fn encoded_state(&self) -> Src::State {
        match self.snapshot {
            Some(state) => state,
            None => self.source.current(),
        }
    }
}

impl<Src: StateSource> ComponentBroadcaster for StateBroadcaster<Src> {
    type Flags = <Src::State as TrackedState>::Flags;

    fn service_id(&self) -> ServiceId {
        <Src::State as TrackedState>::SERVICE
    }

    fn component_id(&self) -> ComponentId {
        self.component
    }

    fn calculate_delta_changes(&mut self) -> Self::Flags {
        let current = self.source.current();
        let flags = match &self.snapshot {
            None => <Self::Flags as ChangeFlags>::ALL,
            Some(previous) => current.diff(previous),
        };

        if !flags.is_none() {
            self.snapshot = Some(current);
        }
        let held = std::mem::replace(&mut self.unreported, <Self::Flags as ChangeFlags>::NONE);
        flags | held
    }

    fn write_changes(&self, writer: &mut MessageWriter, flags: Self::Flags) {
        self.encoded_state().encode(flags, writer);
    }

    fn prepare_complete(&mut self) {
        // Without a snapshot nothing was ever sent, so there is no delta to hold
        let had_snapshot = self.snapshot.is_some();
        let flags = self.calculate_delta_changes();
        if had_snapshot {
            self.unreported = self.unreported | flags;
        }
    }
}
