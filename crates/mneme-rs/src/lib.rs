//! Public SDK surface for Mneme.
//!
//! This crate re-exports the building blocks and provides [`MemoryRuntime`],
//! which wires short-term and long-term memory from one [`config::MnemeConfig`].

mod runtime;

/// Re-export for convenience.
pub use mneme_rs_config as config;
pub use mneme_rs_core as core;
/// Re-export for convenience.
pub use mneme_rs_memory as memory;
/// Re-export for convenience.
pub use mneme_rs_protocol as protocol;
pub use mneme_rs_storage as storage;

pub use runtime::{MemoryRuntime, RuntimeError};

#[inline]
/// Initialize logging using env_logger if the "logging" feature is enabled.
///
/// This is a no-op if the feature is not enabled. Binaries are still expected
/// to call this early in startup to ensure log output is wired up.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::try_init();
    }
}
