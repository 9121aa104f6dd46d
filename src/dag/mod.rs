// src/dag/mod.rs

//! Dependency ordering for triggers.
//!
//! - [`planner`] computes the execution queue, merges transitive
//!   dependencies and reports cycles.

pub mod planner;

pub use planner::{plan, Plan};
