mod compiler;
mod kernel;
mod memory;
mod scheduler;
mod server;

pub use compiler::*;
pub use kernel::*;
pub use memory::*;
pub use server::*;
