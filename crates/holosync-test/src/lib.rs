//! HoloSync Test Harness - End-to-end host and spectator validation
//!
//! This crate provides:
//! - Simulated spectators that mirror host state over the in-process transport
//! - A convergence harness driving a host through scripted mutations
//! - End-to-end coordinate discovery scenarios

pub mod integration;

pub use integration::*;
