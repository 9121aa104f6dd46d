// src/engine/handler.rs

//! Handler callables and how registrations resolve them.
//!
//! A handler is resolved exactly once, at registration time, from an
//! [`EventRef`]:
//! - [`EventRef::Method`] looks a name up on the engine's default [`Scope`].
//! - [`EventRef::Scoped`] looks a name up on an explicit scope.
//! - [`EventRef::Callable`] / [`EventRef::ScopedCallable`] carry the handler
//!   directly.
//!
//! Handlers receive the engine itself so they can deliver signals or resolve
//! triggers while a pass is running; such calls only schedule a follow-up pass.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use crate::engine::trigger::Firing;
use crate::engine::{Engine, TriggerName};

/// What a handler asks the engine to do with its trigger after firing.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<V> {
    /// Mark the trigger resolved, publishing the value to dependents.
    Resolve(Option<V>),
    /// Leave the trigger rejected; dependents block until it is resolved
    /// by someone else.
    Reject,
}

impl<V> Outcome<V> {
    pub fn resolved(value: V) -> Self {
        Outcome::Resolve(Some(value))
    }

    pub fn done() -> Self {
        Outcome::Resolve(None)
    }
}

pub type HandlerResult<V> = anyhow::Result<Outcome<V>>;

type HandlerCallable<V> = dyn FnMut(&mut Engine<V>, &Payload<V>, &Firing) -> HandlerResult<V>;

/// Shared, mutable handler callable.
pub type HandlerFn<V> = Rc<RefCell<HandlerCallable<V>>>;

/// Wrap a closure as a [`HandlerFn`].
pub fn handler<V, F>(f: F) -> HandlerFn<V>
where
    F: FnMut(&mut Engine<V>, &Payload<V>, &Firing) -> HandlerResult<V> + 'static,
{
    Rc::new(RefCell::new(f))
}

/// Resolves method names to handlers.
pub trait Scope<V> {
    /// Label used in diagnostics and as the firing context.
    fn label(&self) -> &str;

    fn lookup(&self, method: &str) -> Option<HandlerFn<V>>;
}

/// Map-backed [`Scope`].
pub struct HandlerRegistry<V> {
    label: String,
    handlers: HashMap<String, HandlerFn<V>>,
}

impl<V> HandlerRegistry<V> {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            handlers: HashMap::new(),
        }
    }

    pub fn insert(&mut self, method: impl Into<String>, handler: HandlerFn<V>) {
        self.handlers.insert(method.into(), handler);
    }

    pub fn with_handler<F>(mut self, method: impl Into<String>, f: F) -> Self
    where
        F: FnMut(&mut Engine<V>, &Payload<V>, &Firing) -> HandlerResult<V> + 'static,
    {
        self.insert(method, handler(f));
        self
    }

    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(|s| s.as_str())
    }
}

impl<V> Scope<V> for HandlerRegistry<V> {
    fn label(&self) -> &str {
        &self.label
    }

    fn lookup(&self, method: &str) -> Option<HandlerFn<V>> {
        self.handlers.get(method).cloned()
    }
}

impl<V> fmt::Debug for HandlerRegistry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<_> = self.handlers.keys().collect();
        methods.sort();
        f.debug_struct("HandlerRegistry")
            .field("label", &self.label)
            .field("methods", &methods)
            .finish()
    }
}

/// Reference to the handler a registration wants to run.
pub enum EventRef<V> {
    Method(String),
    Callable(HandlerFn<V>),
    Scoped(Rc<dyn Scope<V>>, String),
    ScopedCallable(Rc<dyn Scope<V>>, HandlerFn<V>),
}

impl<V> EventRef<V> {
    pub fn method(name: impl Into<String>) -> Self {
        EventRef::Method(name.into())
    }

    pub fn callable<F>(f: F) -> Self
    where
        F: FnMut(&mut Engine<V>, &Payload<V>, &Firing) -> HandlerResult<V> + 'static,
    {
        EventRef::Callable(handler(f))
    }

    /// Human readable form for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            EventRef::Method(method) => method.clone(),
            EventRef::Callable(_) => "<callable>".to_string(),
            EventRef::Scoped(scope, method) => format!("{}.{}", scope.label(), method),
            EventRef::ScopedCallable(scope, _) => format!("{}.<callable>", scope.label()),
        }
    }

    /// Resolve to a handler plus the label of the scope it is bound to.
    ///
    /// Method lookups against the default scope carry no context label; the
    /// run loop falls back to the engine's current default scope.
    pub(crate) fn resolve(&self, default_scope: &dyn Scope<V>) -> (Option<HandlerFn<V>>, Option<String>) {
        match self {
            EventRef::Method(method) => (default_scope.lookup(method), None),
            EventRef::Callable(f) => (Some(Rc::clone(f)), None),
            EventRef::Scoped(scope, method) => {
                (scope.lookup(method), Some(scope.label().to_string()))
            }
            EventRef::ScopedCallable(scope, f) => {
                (Some(Rc::clone(f)), Some(scope.label().to_string()))
            }
        }
    }
}

impl<V> Clone for EventRef<V> {
    fn clone(&self) -> Self {
        match self {
            EventRef::Method(m) => EventRef::Method(m.clone()),
            EventRef::Callable(f) => EventRef::Callable(Rc::clone(f)),
            EventRef::Scoped(s, m) => EventRef::Scoped(Rc::clone(s), m.clone()),
            EventRef::ScopedCallable(s, f) => EventRef::ScopedCallable(Rc::clone(s), Rc::clone(f)),
        }
    }
}

impl<V> fmt::Debug for EventRef<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventRef({})", self.describe())
    }
}

/// Values handed to a handler when its trigger fires.
///
/// Every watched signal appears, even if it never carried a value.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload<V> {
    pub(crate) signals: BTreeMap<String, Option<V>>,
    pub(crate) dependencies: BTreeMap<TriggerName, Option<V>>,
}

impl<V> Default for Payload<V> {
    fn default() -> Self {
        Self {
            signals: BTreeMap::new(),
            dependencies: BTreeMap::new(),
        }
    }
}

impl<V> Payload<V> {
    /// Current value of a watched signal.
    pub fn signal(&self, name: &str) -> Option<&V> {
        self.signals.get(name).and_then(|v| v.as_ref())
    }

    /// Value a dependency was resolved with.
    pub fn dependency(&self, name: &str) -> Option<&V> {
        self.dependencies.get(name).and_then(|v| v.as_ref())
    }

    pub fn signals(&self) -> impl Iterator<Item = (&str, Option<&V>)> {
        self.signals.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    pub fn dependencies(&self) -> impl Iterator<Item = (&str, Option<&V>)> {
        self.dependencies.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }
}
