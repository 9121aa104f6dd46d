// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::engine::TriggerName;

#[derive(Error, Debug)]
pub enum TriggerdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Trigger '{trigger}' references handler '{reference}' which does not resolve to a callable")]
    UnresolvedHandler {
        trigger: TriggerName,
        reference: String,
    },

    #[error("Trigger '{trigger}' has an invalid signal list: {reason}")]
    InvalidSignalList { trigger: String, reason: String },

    #[error("Handler for trigger '{trigger}' failed: {source}")]
    Handler {
        trigger: TriggerName,
        #[source]
        source: anyhow::Error,
    },

    #[error("Run loop did not settle after {0} passes")]
    PassLimitExceeded(usize),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TriggerdagError>;
