//! Node core: command surface and hardware ports.
//!
//! The dispatcher is the only consumer of complete inbound messages and
//! the only producer of replies; everything it touches on the hardware
//! side goes through the port traits in [`ports`].

pub mod commands;
pub mod dispatcher;
pub mod ports;

pub use commands::Command;
pub use dispatcher::{CommandDispatcher, PollOutcome};
