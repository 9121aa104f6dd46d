// src/engine/registry.rs

//! Trigger registration and signal-list normalization.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, warn};

use crate::engine::handler::EventRef;
use crate::engine::trigger::{SignalSlot, Trigger};
use crate::engine::{Engine, TriggerName};
use crate::errors::{Result, TriggerdagError};
use crate::types::UnresolvedHandlerPolicy;

/// Prefix marking a dependency on another trigger.
pub const DEPENDENCY_PREFIX: char = '@';
/// Prefix marking an optional signal.
pub const OPTIONAL_PREFIX: char = '*';

/// Registration record accepted by [`Engine::register`].
#[derive(Debug, Clone)]
pub struct Registration<V> {
    /// Explicit name; auto-assigned when `None`.
    pub name: Option<TriggerName>,
    /// Comma separated signal list, e.g. `"a,b,*c,@other"`.
    pub signals: String,
    pub event: EventRef<V>,
    /// Initial dependency-satisfaction flag.
    pub state: bool,
}

impl<V> Registration<V> {
    pub fn new(signals: impl Into<String>, event: EventRef<V>) -> Self {
        Self {
            name: None,
            signals: signals.into(),
            event,
            state: false,
        }
    }

    pub fn named(mut self, name: impl Into<TriggerName>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_state(mut self, state: bool) -> Self {
        self.state = state;
        self
    }
}

/// Normalized form of a signal list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalList {
    pub slots: BTreeMap<String, SignalSlot>,
    pub depends: Vec<TriggerName>,
}

/// Parse a comma separated signal list.
///
/// Entries are trimmed. The first declaration of a signal wins; repeats
/// (required or optional) are ignored, so duplicates never inflate the
/// wait count.
pub fn parse_signal_list(list: &str) -> std::result::Result<SignalList, String> {
    let mut slots = BTreeMap::new();
    let mut depends: Vec<TriggerName> = Vec::new();

    if list.trim().is_empty() {
        return Err("signal list is empty".to_string());
    }

    for raw in list.split(',') {
        let entry = raw.trim();
        if let Some(dep) = entry.strip_prefix(DEPENDENCY_PREFIX) {
            if dep.is_empty() {
                return Err(format!("dependency entry '{entry}' has no trigger name"));
            }
            if !depends.iter().any(|d| d == dep) {
                depends.push(dep.to_string());
            }
        } else if let Some(signal) = entry.strip_prefix(OPTIONAL_PREFIX) {
            if signal.is_empty() {
                return Err(format!("optional entry '{entry}' has no signal name"));
            }
            slots.entry(signal.to_string()).or_insert_with(SignalSlot::optional);
        } else if entry.is_empty() {
            return Err(format!("empty entry in signal list '{list}'"));
        } else {
            slots.entry(entry.to_string()).or_insert_with(SignalSlot::required);
        }
    }

    Ok(SignalList { slots, depends })
}

impl<V> Engine<V>
where
    V: Clone + PartialEq + fmt::Debug + 'static,
{
    /// Add or replace a trigger.
    ///
    /// Unless `skip_sort` is set the execution order is recomputed right away;
    /// bulk callers pass `true` and sort once at the end.
    pub fn register(&mut self, registration: Registration<V>, skip_sort: bool) -> Result<&mut Self> {
        let Registration {
            name,
            signals,
            event,
            state,
        } = registration;

        let name = name.unwrap_or_else(|| self.next_auto_name());

        let list = parse_signal_list(&signals).map_err(|reason| TriggerdagError::InvalidSignalList {
            trigger: name.clone(),
            reason,
        })?;

        let (handler, context) = event.resolve(&*self.scope);
        if handler.is_none() {
            match self.config.unresolved_handler {
                UnresolvedHandlerPolicy::Reject => {
                    return Err(TriggerdagError::UnresolvedHandler {
                        trigger: name,
                        reference: event.describe(),
                    });
                }
                UnresolvedHandlerPolicy::Inert => {
                    warn!(
                        trigger = %name,
                        handler = %event.describe(),
                        "handler did not resolve; trigger is stored inert"
                    );
                }
            }
        }

        if list.slots.is_empty() {
            warn!(
                trigger = %name,
                depends = ?list.depends,
                "trigger declares no signals and can never fire"
            );
        }

        let trigger = Trigger::new(name.clone(), handler, context, list.slots, list.depends, state);

        debug!(
            trigger = %name,
            wait = ?trigger.wait,
            gate = ?trigger.gate,
            depends = ?trigger.declared_depends(),
            "registered trigger"
        );

        if self.regs.insert(name.clone(), trigger).is_some() {
            debug!(trigger = %name, "replaced existing trigger");
        } else {
            self.order.push(name.clone());
        }
        self.states.insert(name, state);

        if !skip_sort {
            self.sort_queue();
        }
        Ok(self)
    }

    /// Smallest unused integer name, scanning up from the queue length.
    fn next_auto_name(&self) -> TriggerName {
        let mut candidate = self.queue.len();
        while self.regs.contains_key(&candidate.to_string()) {
            candidate += 1;
        }
        candidate.to_string()
    }
}
