// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::engine::registry::parse_signal_list;
use crate::errors::{Result, TriggerdagError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::TriggerdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.trigger))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_triggers(cfg)?;
    validate_engine_config(cfg)?;
    validate_trigger_names(cfg)?;
    validate_trigger_entries(cfg)?;
    Ok(())
}

fn ensure_has_triggers(cfg: &RawConfigFile) -> Result<()> {
    if cfg.trigger.is_empty() {
        return Err(TriggerdagError::ConfigError(
            "config must contain at least one [[trigger]] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_engine_config(cfg: &RawConfigFile) -> Result<()> {
    // unresolved_handler is strongly typed and validated during
    // deserialization.

    if cfg.config.max_passes == 0 {
        return Err(TriggerdagError::ConfigError(
            "[config].max_passes must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}

fn validate_trigger_names(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = HashSet::new();
    for (index, trigger) in cfg.trigger.iter().enumerate() {
        let Some(name) = trigger.name.as_deref() else {
            continue;
        };
        if name.trim().is_empty() {
            return Err(TriggerdagError::ConfigError(format!(
                "trigger #{} has an empty name",
                index + 1
            )));
        }
        if !seen.insert(name) {
            return Err(TriggerdagError::ConfigError(format!(
                "trigger name '{}' is declared more than once",
                name
            )));
        }
    }
    Ok(())
}

fn validate_trigger_entries(cfg: &RawConfigFile) -> Result<()> {
    for (index, trigger) in cfg.trigger.iter().enumerate() {
        let label = trigger
            .name
            .clone()
            .unwrap_or_else(|| format!("#{}", index + 1));
        if trigger.handler.trim().is_empty() {
            return Err(TriggerdagError::ConfigError(format!(
                "trigger '{}' has an empty handler",
                label
            )));
        }
        if let Err(reason) = parse_signal_list(&trigger.signals) {
            return Err(TriggerdagError::InvalidSignalList {
                trigger: label,
                reason,
            });
        }
    }
    Ok(())
}
