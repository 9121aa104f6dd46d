// src/engine/bus.rs

//! Signal bus: signal values, dependency flags and the wait-counter protocol.

use std::fmt;

use tracing::{debug, trace};

use crate::engine::{Engine, TriggerName};

impl<V> Engine<V>
where
    V: Clone + PartialEq + fmt::Debug + 'static,
{
    /// Deliver a signal.
    ///
    /// `value` replaces the stored value when given; `None` delivers the
    /// signal and keeps whatever value was stored before. With
    /// `check_changed`, delivering the value already stored is a no-op.
    pub fn signal(&mut self, name: &str, value: Option<V>, check_changed: bool) -> &mut Self {
        if check_changed && self.signals.get(name) == value.as_ref() {
            trace!(signal = %name, "signal value unchanged; ignoring");
            return self;
        }
        if let Some(value) = value {
            self.signals.insert(name.to_string(), value);
        }

        let mut fireable = false;
        for trigger in self.regs.values_mut() {
            if trigger.note_arrival(name) {
                trace!(
                    trigger = %trigger.name,
                    signal = %name,
                    wait = ?trigger.wait,
                    "signal arrived"
                );
                fireable |= trigger.is_ready();
            }
        }

        debug!(signal = %name, fireable, "signal delivered");
        if fireable {
            self.schedule_run();
        }
        self
    }

    /// Set a trigger's dependency flag and publish `value` to its dependents.
    ///
    /// The name does not have to be registered; external dependencies are
    /// satisfied this way.
    pub fn resolve(&mut self, trigger: impl AsRef<str>, value: Option<V>, skip_run: bool) -> &mut Self {
        let name = trigger.as_ref();
        debug!(trigger = %name, ?value, "resolved");
        self.states.insert(name.to_string(), true);
        self.dependency_values.insert(name.to_string(), value);
        if !skip_run {
            self.schedule_run();
        }
        self
    }

    /// Clear a trigger's dependency flag and drop its published value.
    pub fn reject(&mut self, trigger: impl AsRef<str>) -> &mut Self {
        let name = trigger.as_ref();
        debug!(trigger = %name, "rejected");
        self.states.insert(name.to_string(), false);
        self.dependency_values.remove(name);
        self
    }

    /// Write a signal value without touching any wait counter.
    pub fn set_data(&mut self, name: &str, value: V) -> &mut Self {
        trace!(signal = %name, ?value, "set data");
        self.signals.insert(name.to_string(), value);
        self
    }

    pub fn get_data(&self, name: &str) -> Option<&V> {
        self.signals.get(name)
    }

    /// Dependency flag of a trigger; `None` if never set.
    pub fn state(&self, trigger: &str) -> Option<bool> {
        self.states.get(trigger).copied()
    }

    pub fn is_resolved(&self, trigger: &str) -> bool {
        self.state(trigger) == Some(true)
    }

    /// Value the trigger was last resolved with.
    pub fn dependency_value(&self, trigger: &str) -> Option<&V> {
        self.dependency_values.get(trigger).and_then(|v| v.as_ref())
    }

    /// Rearm wait counters and optional gates for one trigger, or for all of
    /// them when `trigger` is `None`. Cancels a pending run.
    ///
    /// Signal values and dependency flags are left alone.
    pub fn clear(&mut self, trigger: Option<&str>) -> &mut Self {
        match trigger {
            Some(name) => {
                if let Some(t) = self.regs.get_mut(name) {
                    t.rearm();
                }
            }
            None => {
                for t in self.regs.values_mut() {
                    t.rearm();
                }
            }
        }
        if self.pending {
            debug!("cancelled pending run");
            self.pending = false;
        }
        debug!(trigger = ?trigger, "cleared");
        self
    }

    /// Drop all signal values and dependency values, restore every trigger's
    /// registration flag, then clear all counters.
    pub fn reset(&mut self) -> &mut Self {
        self.signals.clear();
        self.dependency_values.clear();
        self.states = self
            .regs
            .values()
            .map(|t| (t.name.clone(), t.initial_state))
            .collect();
        self.clear(None)
    }

    /// Full teardown: registry, queue and all state.
    pub fn reset_all(&mut self) -> &mut Self {
        self.regs.clear();
        self.order.clear();
        self.queue.clear();
        self.cycles.clear();
        self.reset()
    }

    /// Names of triggers whose signal bookkeeping currently allows firing.
    pub fn ready_triggers(&self) -> Vec<TriggerName> {
        self.queue
            .iter()
            .filter(|name| self.regs.get(*name).is_some_and(|t| t.is_ready()))
            .cloned()
            .collect()
    }
}
