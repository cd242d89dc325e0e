//! Engine - catalog, executor and the threads serving connections
//!
//! Modules:
//! - core: `Engine` construction, the accept loop and per-connection threads
//! - shutdown: the stop signal shared by the accept loop and `Engine::stop`

mod core;
mod shutdown;

pub use self::core::Engine;
pub use shutdown::StopSignal;
