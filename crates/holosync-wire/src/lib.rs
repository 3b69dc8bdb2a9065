//! HoloSync Wire Protocol - Component message format
//!
//! Every component message has the same shape:
//! - Fixed header (9 bytes): command, service tag, component id
//! - Change-flag byte (delta messages only)
//! - Field values for each set flag, in ascending bit order
//!
//! There is no schema negotiation. Encoder and decoder share the field
//! layout of each change-flag value.

pub mod codec;
pub mod flags;
pub mod header;
pub mod message;

pub use codec::*;
pub use flags::*;
pub use header::*;
pub use message::*;
