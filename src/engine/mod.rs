// src/engine/mod.rs

//! The trigger engine.
//!
//! One [`Engine`] owns four cooperating facilities:
//! - the registry ([`registry`]): normalizes and stores triggers
//! - the signal bus ([`bus`]): signal values, dependency flags and the
//!   wait-counter protocol
//! - the order planner ([`crate::dag::planner`]): execution queue and
//!   transitive dependency merge
//! - the run loop ([`run_loop`]): debounced, single-sweep batch execution
//!
//! The engine itself is synchronous and single-threaded. The host drives
//! deferred passes through [`Engine::run_pending`] / [`Engine::run_until_idle`],
//! or hands the engine to the async shell in [`runtime`].

/// Canonical trigger name type used throughout the engine.
pub type TriggerName = String;

pub mod builtin;
pub mod bus;
pub mod handler;
pub mod registry;
pub mod run_loop;
pub mod runtime;
pub mod trigger;

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::dag::planner;
use crate::errors::Result;
use crate::types::EngineConfig;

pub use handler::{handler, EventRef, HandlerFn, HandlerRegistry, HandlerResult, Outcome, Payload, Scope};
pub use registry::Registration;
pub use run_loop::{FiredTrigger, PassReport};
pub use runtime::{Runtime, RuntimeEvent};
pub use trigger::{Firing, OptionalGate, SignalSlot, SlotKind, Trigger};

/// Label of the scope used when none is supplied.
pub const DEFAULT_SCOPE_LABEL: &str = "default";

/// Dependency-aware signal scheduler.
pub struct Engine<V> {
    config: EngineConfig,
    scope: Rc<dyn Scope<V>>,
    regs: HashMap<TriggerName, Trigger<V>>,
    /// Registration order; the planner's pass order.
    order: Vec<TriggerName>,
    /// Validated execution order.
    queue: Vec<TriggerName>,
    signals: HashMap<String, V>,
    /// Values published by `resolve`, keyed by trigger name.
    dependency_values: HashMap<TriggerName, Option<V>>,
    /// Dependency-satisfaction flags, keyed by trigger name.
    states: HashMap<TriggerName, bool>,
    cycles: Vec<Vec<TriggerName>>,
    /// Single-slot deferred run marker.
    pending: bool,
    /// Set while a pass is executing.
    running: bool,
}

impl<V> Engine<V>
where
    V: Clone + PartialEq + fmt::Debug + 'static,
{
    /// Build an engine with the default configuration.
    ///
    /// `registrations` are applied in order and sorted once at the end.
    pub fn new(
        scope: Option<Rc<dyn Scope<V>>>,
        registrations: Vec<Registration<V>>,
    ) -> Result<Self> {
        Self::with_config(EngineConfig::default(), scope, registrations)
    }

    pub fn with_config(
        config: EngineConfig,
        scope: Option<Rc<dyn Scope<V>>>,
        registrations: Vec<Registration<V>>,
    ) -> Result<Self> {
        let mut engine = Self {
            config,
            scope: default_scope(),
            regs: HashMap::new(),
            order: Vec::new(),
            queue: Vec::new(),
            signals: HashMap::new(),
            dependency_values: HashMap::new(),
            states: HashMap::new(),
            cycles: Vec::new(),
            pending: false,
            running: false,
        };
        engine.set_scope(scope);

        if !registrations.is_empty() {
            for registration in registrations {
                engine.register(registration, true)?;
            }
            engine.sort_queue();
        }

        Ok(engine)
    }

    /// Change the default scope used to resolve method-name handlers.
    ///
    /// `None` installs an empty scope. Already registered triggers keep the
    /// handlers they resolved at registration time.
    pub fn set_scope(&mut self, scope: Option<Rc<dyn Scope<V>>>) -> &mut Self {
        self.scope = scope.unwrap_or_else(default_scope);
        debug!(scope = %self.scope.label(), "default scope set");
        self
    }

    pub fn scope(&self) -> &Rc<dyn Scope<V>> {
        &self.scope
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn trigger(&self, name: &str) -> Option<&Trigger<V>> {
        self.regs.get(name)
    }

    /// Triggers in execution order.
    pub fn triggers(&self) -> impl Iterator<Item = &Trigger<V>> {
        self.queue.iter().filter_map(|name| self.regs.get(name))
    }

    pub fn queue(&self) -> &[TriggerName] {
        &self.queue
    }

    /// Dependency cycles found by the last sort.
    pub fn cycles(&self) -> &[Vec<TriggerName>] {
        &self.cycles
    }

    pub fn len(&self) -> usize {
        self.regs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regs.is_empty()
    }

    /// Re-run the order planner over the current registry.
    pub(crate) fn sort_queue(&mut self) {
        let plan = planner::plan(self.order.iter().filter_map(|name| {
            self.regs
                .get(name)
                .map(|t| (name.as_str(), t.declared_depends.as_slice()))
        }));

        for (name, depends) in plan.merged {
            if let Some(trigger) = self.regs.get_mut(&name) {
                trigger.depends = depends;
            }
        }
        debug!(queue = ?plan.queue, external = ?plan.external, "execution order updated");
        self.queue = plan.queue;
        self.cycles = plan.cycles;
    }
}

fn default_scope<V: 'static>() -> Rc<dyn Scope<V>> {
    Rc::new(HandlerRegistry::<V>::new(DEFAULT_SCOPE_LABEL))
}

impl<V: fmt::Debug> fmt::Debug for Engine<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("scope", &self.scope.label())
            .field("queue", &self.queue)
            .field("signals", &self.signals)
            .field("states", &self.states)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}
