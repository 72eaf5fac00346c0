//! Host-facing command/event contract for UI integration.

pub mod channel;
pub mod contract;
pub mod stdio;
