// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod types;

use std::rc::Rc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::{parse_assignment, CliArgs};
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::engine::builtin::builtin_scope;
use crate::engine::{Engine, Runtime, RuntimeEvent, Scope, SlotKind};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - engine construction over the built-in handler scope
/// - the async runtime, fed with `--resolve` and `--signal` events in one tick
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_and_validate(&args.config)?;

    let scope: Rc<dyn Scope<toml::Value>> = Rc::new(builtin_scope());
    let registrations = cfg.registrations(std::slice::from_ref(&scope))?;
    let engine = Engine::with_config(cfg.config, Some(scope), registrations)?;

    if args.dry_run {
        print_dry_run(&cfg, &engine);
        return Ok(());
    }

    let events = seed_events(&args);
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent<toml::Value>>(events.len() + 1);

    info!(events = events.len(), "delivering command-line events");
    for event in events {
        rt_tx.send(event).await?;
    }
    rt_tx.send(RuntimeEvent::ShutdownRequested).await?;

    let runtime = Runtime::new(engine, rt_rx);
    let engine = runtime.run().await?;

    print_summary(&engine);
    Ok(())
}

/// Resolves first, then signals, preserving command-line order within each.
fn seed_events(args: &CliArgs) -> Vec<RuntimeEvent<toml::Value>> {
    let resolves = args.resolves.iter().map(|raw| {
        let (trigger, value) = parse_assignment(raw);
        RuntimeEvent::Resolve { trigger, value }
    });
    let signals = args.signals.iter().map(|raw| {
        let (name, value) = parse_assignment(raw);
        RuntimeEvent::Signal {
            name,
            value,
            check_changed: false,
        }
    });
    resolves.chain(signals).collect()
}

/// Simple dry-run output: print triggers, execution order and cycles.
fn print_dry_run(cfg: &ConfigFile, engine: &Engine<toml::Value>) {
    println!("triggerdag dry-run");
    println!(
        "  config.unresolved_handler = {:?}",
        cfg.config.unresolved_handler
    );
    println!("  config.max_passes = {}", cfg.config.max_passes);
    println!();

    println!("execution order ({}):", engine.queue().len());
    for trigger in engine.triggers() {
        println!("  - {}", trigger.name());
        let signals: Vec<String> = trigger
            .slots()
            .map(|(name, slot)| match slot.kind {
                SlotKind::Required => name.to_string(),
                SlotKind::Optional => format!("*{name}"),
            })
            .collect();
        if !signals.is_empty() {
            println!("      signals: {}", signals.join(", "));
        }
        if !trigger.depends().is_empty() {
            println!("      depends: {:?}", trigger.depends());
        }
        if !trigger.has_handler() {
            println!("      handler: <unresolved>");
        }
        if trigger.initial_state() {
            println!("      state: true");
        }
    }

    if !engine.cycles().is_empty() {
        println!();
        println!("cycles ({}):", engine.cycles().len());
        for cycle in engine.cycles() {
            println!("  - {}", cycle.join(" <-> "));
        }
    }

    debug!("dry-run complete (nothing fired)");
}

fn print_summary(engine: &Engine<toml::Value>) {
    println!("triggers ({}):", engine.queue().len());
    for trigger in engine.triggers() {
        let name = trigger.name();
        let state = if engine.is_resolved(name) {
            "resolved"
        } else {
            "pending"
        };
        match engine.dependency_value(name) {
            Some(value) => println!("  - {name}: {state} = {value}"),
            None => println!("  - {name}: {state}"),
        }
    }
}
