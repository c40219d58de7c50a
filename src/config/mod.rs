//! Service Configuration Module
//!
//! Storage locations, upload layout, ratchet policy and category thresholds,
//! loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `MILEAGE_WATCH_CONFIG` environment variable (path to TOML file)
//! 2. `mileage_watch.toml` in the current working directory
//! 3. Built-in defaults
//!
//! The loaded [`ServiceConfig`] is passed explicitly to the components that
//! need it; nothing reads configuration from global state.

mod service_config;
pub mod defaults;
pub mod validation;

pub use service_config::*;
