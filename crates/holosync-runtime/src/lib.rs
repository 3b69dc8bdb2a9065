//! HoloSync Runtime - Spectator host orchestration
//!
//! Each host tick:
//! 1. Apply peer joins and departures
//! 2. Apply queued marker reports to the coordinate registry
//! 3. Diff every tracked component and send deltas or complete state

pub mod config;
pub mod logging;
pub mod node;

pub use config::*;
pub use logging::*;
pub use node::*;
