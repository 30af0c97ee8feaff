#![warn(missing_docs)]

//! Runtime crate for tile-parallel compute kernels.
//!
//! It exposes the compute backend as a [server](server::ComputeServer) trait, a thread-safe
//! [client](client::ComputeClient) to talk to it, and a [host](host) backend that executes
//! work-groups on CPU threads.

#[macro_use]
extern crate derive_new;

mod backtrace;
mod id;
mod properties;

/// Compute client module.
pub mod client;
/// Global configuration module.
pub mod config;
/// Host backend module.
pub mod host;
/// Debug and profiling loggers.
pub mod logging;
/// Compute server module.
pub mod server;
/// Launch validation utilities.
pub mod validation;

pub use backtrace::*;
pub use id::*;
pub use properties::*;
