// src/engine/trigger.rs

//! Trigger records and their per-signal slots.

use std::collections::BTreeMap;
use std::fmt;

use crate::engine::handler::HandlerFn;
use crate::engine::TriggerName;

/// Whether a trigger must see a signal or merely watches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Required,
    Optional,
}

/// One watched signal on a trigger.
///
/// `arrived` is set when the signal is delivered and cleared again when the
/// trigger fires (or is cleared).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalSlot {
    pub kind: SlotKind,
    pub arrived: bool,
}

impl SignalSlot {
    pub fn required() -> Self {
        Self {
            kind: SlotKind::Required,
            arrived: false,
        }
    }

    pub fn optional() -> Self {
        Self {
            kind: SlotKind::Optional,
            arrived: false,
        }
    }
}

/// Condition over a trigger's optional signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionalGate {
    /// No optional signals declared.
    Absent,
    /// Waiting for any optional signal.
    Armed,
    /// At least one optional signal arrived since the last firing or rearm.
    Met,
}

/// A registered unit of work.
pub struct Trigger<V> {
    pub(crate) name: TriggerName,
    pub(crate) handler: Option<HandlerFn<V>>,
    /// Label of the scope the handler was resolved from.
    pub(crate) context: Option<String>,
    pub(crate) slots: BTreeMap<String, SignalSlot>,
    /// Dependencies exactly as parsed from the signal list.
    pub(crate) declared_depends: Vec<TriggerName>,
    /// Declared dependencies plus everything merged in by the planner.
    pub(crate) depends: Vec<TriggerName>,
    pub(crate) wait: Option<usize>,
    pub(crate) gate: OptionalGate,
    pub(crate) changed: BTreeMap<String, bool>,
    pub(crate) initial_state: bool,
}

impl<V> Trigger<V> {
    /// Build an armed trigger: wait counter at the number of required slots,
    /// optional gate armed when any optional slot is declared.
    pub(crate) fn new(
        name: TriggerName,
        handler: Option<HandlerFn<V>>,
        context: Option<String>,
        slots: BTreeMap<String, SignalSlot>,
        depends: Vec<TriggerName>,
        initial_state: bool,
    ) -> Self {
        let gate = if slots.values().any(|slot| slot.kind == SlotKind::Optional) {
            OptionalGate::Armed
        } else {
            OptionalGate::Absent
        };
        let mut trigger = Self {
            name,
            handler,
            context,
            slots,
            declared_depends: depends.clone(),
            depends,
            wait: None,
            gate,
            changed: BTreeMap::new(),
            initial_state,
        };
        trigger.rearm();
        trigger
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// `false` when the handler reference did not resolve.
    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    pub fn slot(&self, signal: &str) -> Option<SignalSlot> {
        self.slots.get(signal).copied()
    }

    pub fn slots(&self) -> impl Iterator<Item = (&str, SignalSlot)> {
        self.slots.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn declared_depends(&self) -> &[TriggerName] {
        &self.declared_depends
    }

    pub fn depends(&self) -> &[TriggerName] {
        &self.depends
    }

    /// Outstanding required signals; `None` when none are declared.
    pub fn wait(&self) -> Option<usize> {
        self.wait
    }

    pub fn gate(&self) -> OptionalGate {
        self.gate
    }

    /// Per-signal freshness recorded at the last firing.
    pub fn changed(&self) -> &BTreeMap<String, bool> {
        &self.changed
    }

    pub fn initial_state(&self) -> bool {
        self.initial_state
    }

    /// Whether signal bookkeeping allows this trigger to fire. Dependency
    /// flags are checked separately by the run loop.
    pub fn is_ready(&self) -> bool {
        match self.wait {
            Some(wait) => wait == 0,
            None => self.gate == OptionalGate::Met,
        }
    }

    fn required_count(&self) -> Option<usize> {
        let count = self
            .slots
            .values()
            .filter(|slot| slot.kind == SlotKind::Required)
            .count();
        (count > 0).then_some(count)
    }

    /// Mark `signal` as arrived. Returns `true` if the slot changed.
    pub(crate) fn note_arrival(&mut self, signal: &str) -> bool {
        let Some(slot) = self.slots.get_mut(signal) else {
            return false;
        };
        if slot.arrived {
            return false;
        }
        slot.arrived = true;
        match slot.kind {
            SlotKind::Required => {
                if let Some(wait) = self.wait.as_mut() {
                    *wait = wait.saturating_sub(1);
                }
            }
            SlotKind::Optional => self.gate = OptionalGate::Met,
        }
        true
    }

    /// Consume arrivals for a firing: every slot goes back to its baseline,
    /// `changed` records which ones had arrived.
    pub(crate) fn consume_arrivals(&mut self) {
        for (signal, slot) in self.slots.iter_mut() {
            self.changed.insert(signal.clone(), slot.arrived);
            if slot.arrived {
                slot.arrived = false;
                if slot.kind == SlotKind::Required {
                    if let Some(wait) = self.wait.as_mut() {
                        *wait += 1;
                    }
                }
            }
        }
        if self.gate == OptionalGate::Met {
            self.gate = OptionalGate::Armed;
        }
    }

    /// Rearm counters and the optional gate without recording freshness.
    pub(crate) fn rearm(&mut self) {
        for slot in self.slots.values_mut() {
            slot.arrived = false;
        }
        self.wait = self.required_count();
        if self.gate == OptionalGate::Met {
            self.gate = OptionalGate::Armed;
        }
    }
}

impl<V> AsRef<str> for Trigger<V> {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

impl<V> fmt::Debug for Trigger<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trigger")
            .field("name", &self.name)
            .field("has_handler", &self.handler.is_some())
            .field("context", &self.context)
            .field("slots", &self.slots)
            .field("depends", &self.depends)
            .field("wait", &self.wait)
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

/// Snapshot of a trigger handed to its handler when it fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Firing {
    pub name: TriggerName,
    pub context: Option<String>,
    pub depends: Vec<TriggerName>,
    pub changed: BTreeMap<String, bool>,
}

impl Firing {
    pub(crate) fn of<V>(trigger: &Trigger<V>) -> Self {
        Self {
            name: trigger.name.clone(),
            context: trigger.context.clone(),
            depends: trigger.depends.clone(),
            changed: trigger.changed.clone(),
        }
    }

    /// Whether `signal` arrived fresh for this firing.
    pub fn is_fresh(&self, signal: &str) -> bool {
        self.changed.get(signal).copied().unwrap_or(false)
    }
}

impl AsRef<str> for Firing {
    fn as_ref(&self) -> &str {
        &self.name
    }
}
