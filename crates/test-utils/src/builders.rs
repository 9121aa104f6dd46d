#![allow(dead_code)]

use triggerdag::config::{ConfigFile, EngineConfig, RawConfigFile, TriggerConfig, UnresolvedHandlerPolicy};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: EngineConfig::default(),
                trigger: Vec::new(),
            },
        }
    }

    pub fn with_trigger(mut self, trigger: TriggerConfig) -> Self {
        self.config.trigger.push(trigger);
        self
    }

    pub fn unresolved_handler(mut self, policy: UnresolvedHandlerPolicy) -> Self {
        self.config.config.unresolved_handler = policy;
        self
    }

    pub fn max_passes(mut self, passes: usize) -> Self {
        self.config.config.max_passes = passes;
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }

    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TriggerConfig`.
pub struct TriggerConfigBuilder {
    trigger: TriggerConfig,
}

impl TriggerConfigBuilder {
    pub fn new(signals: &str, handler: &str) -> Self {
        Self {
            trigger: TriggerConfig {
                name: None,
                signals: signals.to_string(),
                handler: handler.to_string(),
                scope: None,
                state: false,
            },
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.trigger.name = Some(name.to_string());
        self
    }

    pub fn scope(mut self, label: &str) -> Self {
        self.trigger.scope = Some(label.to_string());
        self
    }

    pub fn state(mut self, val: bool) -> Self {
        self.trigger.state = val;
        self
    }

    pub fn build(self) -> TriggerConfig {
        self.trigger
    }
}
