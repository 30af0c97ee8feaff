/// Compilation config module.
pub mod compilation;
/// Host backend config module.
pub mod host;
/// Profiling config module.
pub mod profiling;

mod base;
mod logger;

pub use base::*;
pub use logger::*;
