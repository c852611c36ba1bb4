//! Outbound ports
//!
//! Services talk to the operating system, the filesystem and the database
//! only through these traits, so tests can swap in mocks.

pub mod adapters;
pub mod outbound;

pub use outbound::*;
