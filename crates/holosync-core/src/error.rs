//! Error types for HoloSync

use thiserror::Error;

use crate::{ComponentId, CoordinateId, ServiceId};

/// Core HoloSync errors
#[derive(Error, Debug)]
pub enum HoloError {
    // Wire errors
    #[error("Invalid wire format: {0}")]
    InvalidWireFormat(String),

    #[error("Buffer too short: expected {expected}, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("Unknown message command: {0}")]
    UnknownCommand(u8),

    #[error("Unknown service {0}")]
    UnknownService(ServiceId),

    // Broadcaster errors
    #[error("Component {0:?} already registered")]
    DuplicateComponent(ComponentId),

    // Coordinate errors
    #[error("Marker {marker} cannot back coordinate {coordinate}")]
    MarkerIdMismatch {
        coordinate: CoordinateId,
        marker: CoordinateId,
    },

    #[error("Coordinate service has been disposed")]
    ServiceDisposed,

    #[error("Marker detector error: {0}")]
    DetectorError(String),

    // Transport errors
    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Unknown connection {0}")]
    UnknownConnection(u64),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result type for HoloSync operations
pub type HoloResult<T> = Result<T, HoloError>;
