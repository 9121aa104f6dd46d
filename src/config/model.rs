// src/config/model.rs

use std::rc::Rc;

use serde::Deserialize;

use crate::engine::{EventRef, Registration, Scope};
use crate::errors::{Result, TriggerdagError};
use crate::types::EngineConfig;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// unresolved_handler = "inert"
/// max_passes = 1000
///
/// [[trigger]]
/// name = "sum"
/// signals = "a,b"
/// handler = "sum"
///
/// [[trigger]]
/// signals = "*tick,@sum"
/// handler = "log"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Engine behaviour from `[config]`.
    #[serde(default)]
    pub config: EngineConfig,

    /// Triggers from `[[trigger]]`, in registration order.
    #[serde(default)]
    pub trigger: Vec<TriggerConfig>,
}

/// A `[[trigger]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TriggerConfig {
    /// Explicit trigger name; auto-assigned when absent.
    #[serde(default)]
    pub name: Option<String>,

    /// Comma separated signal list (`name`, `*optional`, `@dependency`).
    pub signals: String,

    /// Method name resolved against the scope.
    pub handler: String,

    /// Label of the scope to resolve `handler` on. Defaults to the engine's
    /// default scope.
    #[serde(default)]
    pub scope: Option<String>,

    /// Initial dependency-satisfaction flag.
    #[serde(default)]
    pub state: bool,
}

/// Validated configuration. Only constructible through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: EngineConfig,
    pub trigger: Vec<TriggerConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(config: EngineConfig, trigger: Vec<TriggerConfig>) -> Self {
        Self { config, trigger }
    }

    /// Turn the `[[trigger]]` entries into registrations, in file order.
    ///
    /// Entries naming a `scope` resolve against the scope with that label in
    /// `scopes`; the rest resolve against the engine's default scope.
    pub fn registrations<V>(&self, scopes: &[Rc<dyn Scope<V>>]) -> Result<Vec<Registration<V>>> {
        self.trigger
            .iter()
            .map(|tc| {
                let event = match &tc.scope {
                    None => EventRef::Method(tc.handler.clone()),
                    Some(label) => {
                        let scope = scopes
                            .iter()
                            .find(|s| s.label() == label.as_str())
                            .ok_or_else(|| {
                                TriggerdagError::ConfigError(format!(
                                    "trigger '{}' uses unknown scope '{}'",
                                    tc.name.as_deref().unwrap_or(&tc.signals),
                                    label
                                ))
                            })?;
                        EventRef::Scoped(Rc::clone(scope), tc.handler.clone())
                    }
                };
                let mut registration = Registration::new(tc.signals.clone(), event).with_state(tc.state);
                if let Some(name) = &tc.name {
                    registration = registration.named(name.clone());
                }
                Ok(registration)
            })
            .collect()
    }
}
