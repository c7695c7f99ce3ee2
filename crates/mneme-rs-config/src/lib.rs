//! Configuration models and layered config loading.
//!
//! This crate owns the Mneme config schema, validation, environment overrides
//! and the layer-merging logic used by the runtime facade.

mod error;
mod loader;
mod model;

/// Public error type returned by config loading and validation APIs.
pub use error::ConfigError;
/// Layered config types and loader options.
pub use loader::{ConfigLayer, ConfigLayerSource, ENV_PREFIX, LayeredConfig, LayeredConfigOptions};
/// Configuration schema models.
pub use model::*;
