// src/engine/builtin.rs

//! Handlers available to triggers declared in a config file.
//!
//! - `log`: log the payload and resolve with no value.
//! - `sum`: resolve with the sum of all numeric signal and dependency values.
//! - `collect`: resolve with a table of every signal and dependency value.
//! - `hold`: log and stay rejected, blocking dependents.

use tracing::info;

use crate::engine::handler::{HandlerRegistry, Outcome, Payload};

pub const BUILTIN_SCOPE_LABEL: &str = "builtin";

pub fn builtin_scope() -> HandlerRegistry<toml::Value> {
    HandlerRegistry::<toml::Value>::new(BUILTIN_SCOPE_LABEL)
        .with_handler("log", |_, payload, firing| {
            info!(trigger = %firing.name, payload = ?payload, "trigger fired");
            Ok(Outcome::done())
        })
        .with_handler("sum", |_, payload, _| Ok(Outcome::resolved(sum(payload))))
        .with_handler("collect", |_, payload, _| Ok(Outcome::resolved(collect(payload))))
        .with_handler("hold", |_, _, firing| {
            info!(trigger = %firing.name, "trigger fired; holding dependents");
            Ok(Outcome::Reject)
        })
}

/// Integer sum when every operand is an integer, float otherwise.
fn sum(payload: &Payload<toml::Value>) -> toml::Value {
    let values = payload
        .signals()
        .chain(payload.dependencies())
        .filter_map(|(_, v)| v);

    let mut int_total: i64 = 0;
    let mut float_total: f64 = 0.0;
    let mut saw_float = false;
    for value in values {
        match value {
            toml::Value::Integer(i) => {
                int_total = int_total.wrapping_add(*i);
                float_total += *i as f64;
            }
            toml::Value::Float(f) => {
                saw_float = true;
                float_total += *f;
            }
            _ => {}
        }
    }

    if saw_float {
        toml::Value::Float(float_total)
    } else {
        toml::Value::Integer(int_total)
    }
}

fn collect(payload: &Payload<toml::Value>) -> toml::Value {
    let mut table = toml::Table::new();
    for (name, value) in payload.signals() {
        if let Some(value) = value {
            table.insert(name.to_string(), value.clone());
        }
    }
    for (name, value) in payload.dependencies() {
        if let Some(value) = value {
            table.insert(format!("@{name}"), value.clone());
        }
    }
    toml::Value::Table(table)
}
