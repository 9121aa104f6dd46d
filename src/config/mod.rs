// src/config/mod.rs

//! Configuration loading and validation for triggerdag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate registrations before they reach the engine (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{ConfigFile, RawConfigFile, TriggerConfig};
pub use crate::types::{EngineConfig, UnresolvedHandlerPolicy};
