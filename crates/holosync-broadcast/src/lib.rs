//! HoloSync Broadcast - Component state change detection
//!
//! A broadcaster watches one component's observable state, diffs it against
//! the last value it sent, and writes only the changed field groups:
//! - `ComponentBroadcaster` is the per-component contract
//! - `StateBroadcaster` implements it for any `TrackedState` value type
//! - `BroadcasterSet` drives many broadcasters once per tick
//! - `SceneMirror` applies the resulting messages on a spectator

pub mod broadcaster;
pub mod mask;
pub mod mirror;
pub mod set;
pub mod state;
pub mod transform;

pub use broadcaster::*;
pub use mask::*;
pub use mirror::*;
pub use set::*;
pub use state::*;
pub use transform::*;
