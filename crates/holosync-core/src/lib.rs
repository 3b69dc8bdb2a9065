//! HoloSync Core - Fundamental types and primitives
//!
//! This crate defines the types shared by every HoloSync crate:
//! - Identifiers (ConnectionId, ComponentId, ServiceId, CoordinateId)
//! - Spatial math (Vector3, Quaternion, Pose)
//! - The workspace error type

pub mod error;
pub mod id;
pub mod math;

pub use error::*;
pub use id::*;
pub use math::*;
