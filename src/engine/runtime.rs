// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, info};

use crate::engine::{Engine, TriggerName};
use crate::errors::Result;

/// Events flowing into the runtime from the host.
#[derive(Debug, Clone)]
pub enum RuntimeEvent<V> {
    Signal {
        name: String,
        value: Option<V>,
        check_changed: bool,
    },
    Resolve {
        trigger: TriggerName,
        value: Option<V>,
    },
    Reject {
        trigger: TriggerName,
    },
    SetData {
        name: String,
        value: V,
    },
    /// Rearm one trigger, or all of them when `trigger` is `None`.
    Clear {
        trigger: Option<TriggerName>,
    },
    Reset,
    /// Graceful shutdown; already buffered events are still applied.
    ShutdownRequested,
}

/// Drives an [`Engine`] from a channel of [`RuntimeEvent`]s.
///
/// Each wake-up applies every event already buffered in the channel, then
/// runs the engine until idle. A burst of events sent without yielding is
/// therefore evaluated as one batch, which is the tick the engine's debounce
/// is defined over.
///
/// The engine is single-threaded, so the runtime is meant to be awaited on
/// the current task rather than spawned onto a multi-threaded executor.
pub struct Runtime<V> {
    engine: Engine<V>,
    event_rx: mpsc::Receiver<RuntimeEvent<V>>,
}

impl<V: fmt::Debug> fmt::Debug for Runtime<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl<V> Runtime<V>
where
    V: Clone + PartialEq + fmt::Debug + 'static,
{
    pub fn new(engine: Engine<V>, event_rx: mpsc::Receiver<RuntimeEvent<V>>) -> Self {
        Self { engine, event_rx }
    }

    /// Main event loop.
    ///
    /// Returns the engine once the channel closes or shutdown is requested,
    /// so callers can inspect the final state.
    pub async fn run(mut self) -> Result<Engine<V>> {
        info!("triggerdag runtime started");

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            let mut keep_running = self.apply(event);
            let mut batch = 1usize;
            while keep_running {
                match self.event_rx.try_recv() {
                    Ok(event) => {
                        keep_running = self.apply(event);
                        batch += 1;
                    }
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                }
            }

            let passes = self.engine.run_until_idle()?;
            debug!(events = batch, passes, "batch evaluated");

            if !keep_running {
                info!("shutdown requested; stopping runtime");
                break;
            }
        }

        info!("runtime exiting");
        Ok(self.engine)
    }

    /// Apply one event to the engine. Returns `false` on shutdown.
    fn apply(&mut self, event: RuntimeEvent<V>) -> bool {
        debug!(?event, "runtime received event");
        match event {
            RuntimeEvent::Signal {
                name,
                value,
                check_changed,
            } => {
                self.engine.signal(&name, value, check_changed);
            }
            RuntimeEvent::Resolve { trigger, value } => {
                self.engine.resolve(&trigger, value, false);
            }
            RuntimeEvent::Reject { trigger } => {
                self.engine.reject(&trigger);
            }
            RuntimeEvent::SetData { name, value } => {
                self.engine.set_data(&name, value);
            }
            RuntimeEvent::Clear { trigger } => {
                self.engine.clear(trigger.as_deref());
            }
            RuntimeEvent::Reset => {
                self.engine.reset();
            }
            RuntimeEvent::ShutdownRequested => return false,
        }
        true
    }
}
