//! Logging setup for programs embedding this crate.
//!
//! The library itself only emits `tracing` events; it never installs a
//! subscriber.

mod tracing_init;

pub use tracing_init::*;
