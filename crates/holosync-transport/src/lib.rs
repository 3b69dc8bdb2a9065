//! HoloSync Transport Layer
//!
//! This crate provides:
//! - The `Transport` broadcast surface used by component broadcasters
//! - UDP transport with a connection table
//! - In-process loopback transport for local spectators and tests

pub mod memory;
pub mod udp;

pub use memory::*;
pub use udp::*;

use std::sync::Arc;

use holosync_core::ConnectionId;

/// Fire-and-forget delivery of one message to a set of peers
///
/// Delivery is the transport's concern. Callers get no acknowledgement and
/// never see per-peer failures; implementations log them instead. Sending
/// to an empty set does nothing.
pub trait Transport: Send + Sync {
    fn send(&self, connections: &[ConnectionId], bytes: &[u8]);
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, connections: &[ConnectionId], bytes: &[u8]) {
        (**self).send(connections, bytes)
    }
}
