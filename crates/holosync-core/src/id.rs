//! Identity types for HoloSync
//!
//! Identifiers are small fixed-width integers so they can be written into
//! message headers without length prefixes.

use std::fmt;

/// Opaque handle for a remote peer, assigned by a transport
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    #[inline]
    pub fn new(id: u64) -> Self {
        ConnectionId(id)
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Conn({})", self.0)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one mirrored component instance on the host
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ComponentId(pub u32);

impl ComponentId {
    pub const ZERO: ComponentId = ComponentId(0);

    #[inline]
    pub fn new(id: u32) -> Self {
        ComponentId(id)
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    #[inline]
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        ComponentId(u32::from_le_bytes(bytes))
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({:08x})", self.0)
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Four-character tag naming the service that decodes a component kind
///
/// Both ends of a connection agree on the tag; it is written verbatim into
/// every message header.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId(pub [u8; 4]);

impl ServiceId {
    #[inline]
    pub const fn new(tag: [u8; 4]) -> Self {
        ServiceId(tag)
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; 4] {
        self.0
    }

    #[inline]
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        ServiceId(bytes)
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("????")
    }
}

impl fmt::Debug for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service({})", self.as_str())
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Spatial coordinate identity (the id printed on the physical marker)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct CoordinateId(pub i32);

impl CoordinateId {
    #[inline]
    pub fn new(id: i32) -> Self {
        CoordinateId(id)
    }
}

impl fmt::Debug for CoordinateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Coordinate({})", self.0)
    }
}

impl fmt::Display for CoordinateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
