// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::default_config_path;

/// Command-line arguments for `triggerdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "triggerdag",
    version,
    about = "Fire dependency-ordered triggers from a batch of signals.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Triggers.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Deliver a signal, optionally with a TOML value (`a=2`, `name="x"`).
    ///
    /// May be repeated; all signals are delivered in the same tick.
    #[arg(long = "signal", value_name = "NAME[=VALUE]")]
    pub signals: Vec<String>,

    /// Resolve a trigger or external dependency before signals are delivered.
    #[arg(long = "resolve", value_name = "NAME[=VALUE]")]
    pub resolves: Vec<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TRIGGERDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the execution order, but don't fire anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

/// Split `NAME[=VALUE]`, parsing the value as a TOML value.
///
/// Values that are not valid TOML (e.g. `a=hello`) are taken as strings.
pub fn parse_assignment(raw: &str) -> (String, Option<toml::Value>) {
    match raw.split_once('=') {
        None => (raw.trim().to_string(), None),
        Some((name, value)) => (name.trim().to_string(), Some(parse_value(value.trim()))),
    }
}

fn parse_value(raw: &str) -> toml::Value {
    toml::from_str::<toml::Table>(&format!("v = {raw}"))
        .ok()
        .and_then(|mut table| table.remove("v"))
        .unwrap_or_else(|| toml::Value::String(raw.to_string()))
}
