use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use triggerdag::engine::{EventRef, Firing, Outcome, Payload};

/// One observed handler invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub trigger: String,
    pub signals: BTreeMap<String, Option<i64>>,
    pub dependencies: BTreeMap<String, Option<i64>>,
    pub changed: BTreeMap<String, bool>,
}

impl Call {
    pub fn signal(&self, name: &str) -> Option<i64> {
        self.signals.get(name).copied().flatten()
    }

    pub fn dependency(&self, name: &str) -> Option<i64> {
        self.dependencies.get(name).copied().flatten()
    }
}

/// Shared log of handler invocations across triggers.
///
/// Handlers built from a recorder append a [`Call`] and then compute their
/// outcome.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    calls: Rc<RefCell<Vec<Call>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handler that records the call and resolves with no value.
    pub fn done(&self) -> EventRef<i64> {
        self.with_outcome(|_| Outcome::done())
    }

    /// Handler that records the call and stays rejected.
    pub fn hold(&self) -> EventRef<i64> {
        self.with_outcome(|_| Outcome::Reject)
    }

    /// Handler that records the call and returns `outcome(payload)`.
    pub fn with_outcome<F>(&self, mut outcome: F) -> EventRef<i64>
    where
        F: FnMut(&Payload<i64>) -> Outcome<i64> + 'static,
    {
        let calls = Rc::clone(&self.calls);
        EventRef::callable(move |_, payload: &Payload<i64>, firing: &Firing| {
            calls.borrow_mut().push(record(payload, firing));
            Ok(outcome(payload))
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// Trigger names in invocation order.
    pub fn fired(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.trigger.clone()).collect()
    }

    pub fn count(&self, trigger: &str) -> usize {
        self.calls.borrow().iter().filter(|c| c.trigger == trigger).count()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }
}

fn record(payload: &Payload<i64>, firing: &Firing) -> Call {
    Call {
        trigger: firing.name.clone(),
        signals: payload
            .signals()
            .map(|(k, v)| (k.to_string(), v.copied()))
            .collect(),
        dependencies: payload
            .dependencies()
            .map(|(k, v)| (k.to_string(), v.copied()))
            .collect(),
        changed: firing.changed.clone(),
    }
}
