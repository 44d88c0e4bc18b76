//! Logging setup shared by hosts and tests of the event registry.
//!
//! The registry crates only emit `tracing` events; installing a subscriber is
//! left to whoever owns the process.

pub mod tracing;

pub use crate::tracing::{DEFAULT_DIRECTIVE, init, init_for_tests};
