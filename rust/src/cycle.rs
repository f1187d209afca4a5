//! Cycle guard for proposed dependency edges.

use pyo3::prelude::*;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;

use crate::graph::ScheduleGraph;
use crate::interner::TaskKey;

/// Outcome of checking a proposed `predecessor -> successor` edge.
#[pyclass]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CycleCheck {
    #[pyo3(get)]
    pub has_cycle: bool,
    /// Closed path `[successor, .., predecessor, successor]` when rejected.
    #[pyo3(get)]
    pub cycle_path: Vec<String>,
    /// User-facing explanation when rejected.
    #[pyo3(get)]
    pub message: Option<String>,
}

#[pymethods]
impl CycleCheck {
    fn __repr__(&self) -> String {
        format!(
            "CycleCheck(has_cycle={}, cycle_path={:?})",
            self.has_cycle, self.cycle_path
        )
    }
}

impl CycleCheck {
    fn acyclic() -> Self {
        Self::default()
    }

    fn rejected(cycle_path: Vec<String>, message: String) -> Self {
        Self {
            has_cycle: true,
            cycle_path,
            message: Some(message),
        }
    }
}

/// Check whether adding `predecessor_id -> successor_id` would close a cycle.
///
/// Breadth-first search from the successor along existing successor edges;
/// reaching the predecessor means the new edge would complete a loop. Parent
/// pointers recorded during the search give the offending path. O(V + E).
///
/// Ids the graph does not know cannot take part in a cycle and yield an
/// acyclic result; edge validation reports them separately.
pub fn would_create_cycle(
    graph: &ScheduleGraph,
    predecessor_id: &str,
    successor_id: &str,
) -> CycleCheck {
    if predecessor_id == successor_id {
        return CycleCheck::rejected(
            vec![predecessor_id.to_string(), successor_id.to_string()],
            "Task cannot depend on itself".to_string(),
        );
    }

    let (Some(target), Some(origin)) = (graph.key(predecessor_id), graph.key(successor_id)) else {
        return CycleCheck::acyclic();
    };

    let mut parent: FxHashMap<TaskKey, TaskKey> = FxHashMap::default();
    let mut queue: VecDeque<TaskKey> = VecDeque::from([origin]);
    parent.insert(origin, origin);

    while let Some(current) = queue.pop_front() {
        if current == target {
            let path = walk_back(graph, &parent, origin, target);
            let message = format!(
                "Adding this dependency would create a circular reference: {}",
                path.join(" → ")
            );
            return CycleCheck::rejected(path, message);
        }
        for edge in graph.successor_edges(current) {
            if !parent.contains_key(&edge.other) {
                parent.insert(edge.other, current);
                queue.push_back(edge.other);
            }
        }
    }

    CycleCheck::acyclic()
}

/// Rebuild `origin .. target` from parent pointers and close the loop with
/// the proposed edge back to `origin`.
fn walk_back(
    graph: &ScheduleGraph,
    parent: &FxHashMap<TaskKey, TaskKey>,
    origin: TaskKey,
    target: TaskKey,
) -> Vec<String> {
    let mut keys = vec![target];
    let mut current = target;
    while current != origin {
        match parent.get(&current) {
            Some(&p) => {
                keys.push(p);
                current = p;
            }
            None => break,
        }
    }
    keys.reverse();
    keys.push(origin);
    graph.ids(&keys)
}
