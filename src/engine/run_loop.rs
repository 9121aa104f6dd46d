// src/engine/run_loop.rs

//! Debounced batch execution.
//!
//! `signal` / `resolve` never run triggers synchronously. They only set the
//! single pending-run slot; any number of further calls before the host runs
//! the pass coalesce into that one batch.
//!
//! A pass is a single sweep over the execution queue. Triggers that become
//! ready because of a handler earlier in the same sweep are picked up by the
//! follow-up pass their `signal` / `resolve` scheduled, unless they sit later
//! in the queue and are already ready by the time the sweep reaches them.
//! Triggers registered during a pass first run in the next one.

use std::fmt;

use tracing::{debug, trace, warn};

use crate::engine::handler::{Outcome, Payload};
use crate::engine::trigger::Firing;
use crate::engine::{Engine, TriggerName};
use crate::errors::{Result, TriggerdagError};

/// One handler invocation within a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct FiredTrigger<V> {
    pub name: TriggerName,
    pub outcome: Outcome<V>,
}

/// What a single pass did.
#[derive(Debug, Clone, PartialEq)]
pub struct PassReport<V> {
    /// Fired triggers, in queue order.
    pub fired: Vec<FiredTrigger<V>>,
}

impl<V> Default for PassReport<V> {
    fn default() -> Self {
        Self { fired: Vec::new() }
    }
}

impl<V> PassReport<V> {
    pub fn is_empty(&self) -> bool {
        self.fired.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.fired.iter().map(|f| f.name.as_str()).collect()
    }
}

impl<V> Engine<V>
where
    V: Clone + PartialEq + fmt::Debug + 'static,
{
    /// Request a deferred pass. No-op while one is already pending.
    pub(crate) fn schedule_run(&mut self) {
        if !self.pending {
            trace!("deferred pass scheduled");
            self.pending = true;
        }
    }

    pub fn has_pending_run(&self) -> bool {
        self.pending
    }

    /// Execute the pending pass, if any.
    ///
    /// Called from inside a handler this does nothing: the current pass
    /// keeps going and the run stays pending for the host.
    pub fn run_pending(&mut self) -> Result<PassReport<V>> {
        if self.running {
            trace!("run_pending called during a pass; deferring");
            return Ok(PassReport::default());
        }
        if !self.pending {
            return Ok(PassReport::default());
        }

        self.running = true;
        let result = self.execute_pass();
        self.running = false;
        result
    }

    /// Run pending passes until nothing is scheduled.
    ///
    /// Returns the number of passes executed. Fails with
    /// `PassLimitExceeded` when handlers keep rescheduling beyond
    /// `max_passes`.
    pub fn run_until_idle(&mut self) -> Result<usize> {
        if self.running {
            return Ok(0);
        }
        let mut passes = 0;
        while self.pending {
            if passes >= self.config.max_passes {
                warn!(passes, "run loop did not settle");
                return Err(TriggerdagError::PassLimitExceeded(passes));
            }
            self.run_pending()?;
            passes += 1;
        }
        Ok(passes)
    }

    fn execute_pass(&mut self) -> Result<PassReport<V>> {
        self.pending = false;
        let mut report = PassReport::default();

        // Handlers may register triggers and re-sort the queue; the sweep
        // covers the order as it stood when the pass started.
        let queue = self.queue.clone();
        for name in queue {
            let Some(payload) = self.prepare_firing(&name) else {
                continue;
            };
            let Some(trigger) = self.regs.get_mut(&name) else {
                continue;
            };
            let Some(handler) = trigger.handler.clone() else {
                continue;
            };
            trigger.consume_arrivals();
            let mut firing = Firing::of(trigger);
            if firing.context.is_none() {
                firing.context = Some(self.scope.label().to_string());
            }

            self.reject(&name);
            debug!(trigger = %name, changed = ?firing.changed, "firing trigger");

            let result = {
                let mut callable = handler.borrow_mut();
                (&mut *callable)(self, &payload, &firing)
            };
            let outcome = result.map_err(|source| TriggerdagError::Handler {
                trigger: name.clone(),
                source,
            })?;

            match &outcome {
                Outcome::Resolve(value) => {
                    self.resolve(&name, value.clone(), true);
                }
                Outcome::Reject => {
                    debug!(trigger = %name, "handler held trigger rejected");
                }
            }
            report.fired.push(FiredTrigger { name, outcome });
        }

        debug!(fired = ?report.names(), "pass complete");
        Ok(report)
    }

    /// Readiness check plus payload assembly.
    ///
    /// Returns `None` when the trigger should be skipped this pass: it is
    /// unknown, inert, not ready, or a merged dependency is unsatisfied.
    fn prepare_firing(&self, name: &str) -> Option<Payload<V>> {
        let trigger = self.regs.get(name)?;
        if !trigger.has_handler() || !trigger.is_ready() {
            return None;
        }

        let mut payload = Payload::default();
        for dep in &trigger.depends {
            if self.states.get(dep) != Some(&true) {
                trace!(trigger = %name, dependency = %dep, "dependency not satisfied; skipping");
                return None;
            }
            let value = self.dependency_values.get(dep).cloned().flatten();
            payload.dependencies.insert(dep.clone(), value);
        }
        for signal in trigger.slots.keys() {
            payload
                .signals
                .insert(signal.clone(), self.signals.get(signal).cloned());
        }
        Some(payload)
    }
}
