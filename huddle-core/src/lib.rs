//! huddle-core: conference lifecycle and membership
//!
//! Domain logic for token-addressable meeting rooms: the conference store,
//! membership resolver, activation policy, and identity issuance, plus the
//! configuration and logging subsystems shared with the binaries.

pub mod conference;
pub mod config;
pub mod logging;

pub use logging::{init_logging, LogLevel};
