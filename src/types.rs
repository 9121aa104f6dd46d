use std::str::FromStr;
use serde::Deserialize;

/// What `register` does when a trigger's handler reference does not resolve
/// to a callable.
///
/// - `Inert`: store the trigger anyway. It takes part in ordering and can be
///   referenced as a dependency, but firing it invokes nothing (default).
/// - `Reject`: fail the registration with `UnresolvedHandler`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnresolvedHandlerPolicy {
    Inert,
    Reject,
}

impl Default for UnresolvedHandlerPolicy {
    fn default() -> Self {
        UnresolvedHandlerPolicy::Inert
    }
}

impl FromStr for UnresolvedHandlerPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "inert" => Ok(UnresolvedHandlerPolicy::Inert),
            "reject" => Ok(UnresolvedHandlerPolicy::Reject),
            other => Err(format!(
                "invalid unresolved_handler: {other} (expected \"inert\" or \"reject\")"
            )),
        }
    }
}

/// Engine-wide behaviour knobs, read from the `[config]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub unresolved_handler: UnresolvedHandlerPolicy,

    /// Upper bound on chained passes in a single `run_until_idle` call.
    #[serde(default = "default_max_passes")]
    pub max_passes: usize,
}

fn default_max_passes() -> usize {
    1000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            unresolved_handler: UnresolvedHandlerPolicy::default(),
            max_passes: default_max_passes(),
        }
    }
}
