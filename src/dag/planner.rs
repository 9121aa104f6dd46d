// src/dag/planner.rs

//! Execution-order planning over trigger dependencies.
//!
//! The planner works in passes over the triggers in registration order. A
//! trigger is placed once every dependency is ready; placing it merges the
//! (already merged) dependency lists of its internal dependencies into its
//! own, so the run loop can validate readiness without walking the graph.
//!
//! Dependencies naming triggers that are not registered are treated as
//! external: they are ready for ordering purposes and are satisfied at run
//! time only by an explicit `resolve`.
//!
//! Whatever is left once a pass places nothing is stuck behind a cycle. Those
//! triggers are appended to the queue in discovery order and reported.

use std::collections::{BTreeSet, HashMap, HashSet};

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use tracing::{debug, warn};

use crate::engine::TriggerName;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Readiness {
    /// Not registered; satisfied manually.
    External,
    /// Placed earlier in this plan.
    Internal,
}

/// Result of planning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    /// Execution order: placed triggers first, then unplaced ones.
    pub queue: Vec<TriggerName>,
    /// Declared plus transitively merged dependencies, per trigger.
    pub merged: HashMap<TriggerName, Vec<TriggerName>>,
    /// Dependency names that do not refer to a registered trigger.
    pub external: BTreeSet<TriggerName>,
    /// Triggers that could not be placed, in discovery order.
    pub unplaced: Vec<TriggerName>,
    /// Dependency cycles among the unplaced triggers.
    pub cycles: Vec<Vec<TriggerName>>,
}

impl Plan {
    pub fn has_cycles(&self) -> bool {
        !self.unplaced.is_empty()
    }
}

/// Plan the execution order for `(name, declared_depends)` pairs given in
/// registration order.
pub fn plan<'a, I>(triggers: I) -> Plan
where
    I: IntoIterator<Item = (&'a str, &'a [TriggerName])>,
{
    let triggers: Vec<(&str, &[TriggerName])> = triggers.into_iter().collect();
    let known: HashSet<&str> = triggers.iter().map(|(name, _)| *name).collect();

    let mut ready: HashMap<TriggerName, Readiness> = HashMap::new();
    let mut external = BTreeSet::new();
    for (_, deps) in &triggers {
        for dep in deps.iter() {
            if !known.contains(dep.as_str()) {
                ready.insert(dep.clone(), Readiness::External);
                external.insert(dep.clone());
            }
        }
    }

    let mut pending = triggers;
    let mut queue = Vec::with_capacity(pending.len());
    let mut merged: HashMap<TriggerName, Vec<TriggerName>> = HashMap::new();

    loop {
        let before = pending.len();
        let mut i = 0;
        while i < pending.len() {
            let (name, deps) = pending[i];
            if !deps.iter().all(|dep| ready.contains_key(dep)) {
                i += 1;
                continue;
            }
            pending.remove(i);

            let mut full: Vec<TriggerName> = Vec::with_capacity(deps.len());
            for dep in deps.iter() {
                push_unique(&mut full, dep);
                if ready.get(dep) == Some(&Readiness::Internal) {
                    if let Some(inherited) = merged.get(dep) {
                        for t in inherited {
                            push_unique(&mut full, t);
                        }
                    }
                }
            }

            debug!(trigger = %name, depends = ?full, "placed trigger in execution order");
            queue.push(name.to_string());
            ready.insert(name.to_string(), Readiness::Internal);
            merged.insert(name.to_string(), full);
        }
        if pending.is_empty() || pending.len() == before {
            break;
        }
    }

    let unplaced: Vec<TriggerName> = pending.iter().map(|(name, _)| name.to_string()).collect();
    let mut cycles = Vec::new();
    if !unplaced.is_empty() {
        for (name, deps) in &pending {
            let mut own = Vec::with_capacity(deps.len());
            for dep in deps.iter() {
                push_unique(&mut own, dep);
            }
            merged.insert(name.to_string(), own);
        }
        cycles = find_cycles(&pending);
        warn!(
            triggers = ?unplaced,
            cycles = ?cycles,
            "cyclic trigger dependencies detected; affected triggers will never fire"
        );
        queue.extend(unplaced.iter().cloned());
    }

    Plan {
        queue,
        merged,
        external,
        unplaced,
        cycles,
    }
}

fn push_unique(list: &mut Vec<TriggerName>, name: &TriggerName) {
    if !list.contains(name) {
        list.push(name.clone());
    }
}

/// Strongly connected components (plus self-loops) among the stuck triggers.
fn find_cycles(stuck: &[(&str, &[TriggerName])]) -> Vec<Vec<TriggerName>> {
    // Edge direction: dependency -> dependent.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for (name, _) in stuck {
        graph.add_node(*name);
    }
    for (name, deps) in stuck {
        for dep in deps.iter() {
            if graph.contains_node(dep.as_str()) {
                graph.add_edge(dep.as_str(), *name, ());
            }
        }
    }

    let mut cycles: Vec<Vec<TriggerName>> = tarjan_scc(&graph)
        .into_iter()
        .filter(|component| {
            component.len() > 1 || graph.contains_edge(component[0], component[0])
        })
        .map(|component| {
            let mut names: Vec<TriggerName> = component.into_iter().map(str::to_string).collect();
            names.sort();
            names
        })
        .collect();
    cycles.sort();
    cycles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps(list: &[&str]) -> Vec<TriggerName> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn run(graph: &[(&str, Vec<TriggerName>)]) -> Plan {
        plan(graph.iter().map(|(n, d)| (*n, d.as_slice())))
    }

    fn position(plan: &Plan, name: &str) -> usize {
        plan.queue.iter().position(|n| n == name).unwrap()
    }

    #[test]
    fn dependencies_are_placed_first() {
        let graph = vec![
            ("c", deps(&["b"])),
            ("b", deps(&["a"])),
            ("a", deps(&[])),
        ];
        let plan = run(&graph);

        assert!(position(&plan, "a") < position(&plan, "b"));
        assert!(position(&plan, "b") < position(&plan, "c"));
        assert!(plan.unplaced.is_empty());
    }

    #[test]
    fn transitive_dependencies_are_merged() {
        let graph = vec![
            ("a", deps(&["ext"])),
            ("b", deps(&["a"])),
            ("c", deps(&["b", "a"])),
        ];
        let plan = run(&graph);

        assert_eq!(plan.merged["a"], deps(&["ext"]));
        assert_eq!(plan.merged["b"], deps(&["a", "ext"]));
        assert_eq!(plan.merged["c"], deps(&["b", "a", "ext"]));
        assert_eq!(plan.external.iter().collect::<Vec<_>>(), vec!["ext"]);
    }

    #[test]
    fn external_dependencies_do_not_inherit() {
        let graph = vec![("a", deps(&["outside"]))];
        let plan = run(&graph);

        assert_eq!(plan.queue, deps(&["a"]));
        assert_eq!(plan.merged["a"], deps(&["outside"]));
    }

    #[test]
    fn mutual_dependency_is_reported_not_dropped() {
        let graph = vec![
            ("x", deps(&["y"])),
            ("y", deps(&["x"])),
            ("free", deps(&[])),
        ];
        let plan = run(&graph);

        assert_eq!(plan.queue, deps(&["free", "x", "y"]));
        assert_eq!(plan.unplaced, deps(&["x", "y"]));
        assert_eq!(plan.cycles, vec![deps(&["x", "y"])]);
    }

    #[test]
    fn dependents_of_a_cycle_are_stuck_but_not_part_of_it() {
        let graph = vec![
            ("self", deps(&["self"])),
            ("downstream", deps(&["self"])),
        ];
        let plan = run(&graph);

        assert_eq!(plan.unplaced, deps(&["self", "downstream"]));
        assert_eq!(plan.cycles, vec![deps(&["self"])]);
    }

    #[test]
    fn duplicate_dependencies_collapse() {
        let graph = vec![("a", deps(&[])), ("b", deps(&["a", "a"]))];
        let plan = run(&graph);

        assert_eq!(plan.merged["b"], deps(&["a"]));
    }
}
