//! HoloSync Coordinates - Spatial reference point discovery
//!
//! This crate implements the coordinate service:
//! - Coordinate and marker model with located-state tracking
//! - Marker detector surface with explicit subscriptions
//! - Batch reconciliation into a registry that never forgets an id
//! - Cancellable discovery with guaranteed detector shutdown

pub mod coordinate;
pub mod detector;
pub mod service;

pub use coordinate::*;
pub use detector::*;
pub use service::*;
