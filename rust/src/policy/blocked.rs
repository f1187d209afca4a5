//! Structural blocking.
//!
//! A task waits on every FS predecessor that is not Completed, and on every
//! open task of the group named by its `depends_on_group`.

use pyo3::prelude::*;
use rustc_hash::FxHashMap;

use crate::graph::ScheduleGraph;
use crate::interner::TaskKey;
use crate::models::{DependencyType, TaskStatus};

/// Lock-badge data for one task.
#[pyclass]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockedState {
    #[pyo3(get)]
    pub task_id: String,
    #[pyo3(get)]
    pub is_blocked: bool,
    /// Incomplete FS predecessors, in edge order.
    #[pyo3(get)]
    pub blocking: Vec<String>,
    /// Open members of the group this task depends on, in input order.
    #[pyo3(get)]
    pub blocking_group: Vec<String>,
}

#[pymethods]
impl BlockedState {
    fn __repr__(&self) -> String {
        format!(
            "BlockedState(task_id={:?}, is_blocked={}, blocking={:?}, blocking_group={:?})",
            self.task_id, self.is_blocked, self.blocking, self.blocking_group
        )
    }
}

/// Members of each `(project, task_group)`, in input order.
struct GroupIndex<'a> {
    members: FxHashMap<(&'a str, &'a str), Vec<TaskKey>>,
}

impl<'a> GroupIndex<'a> {
    fn new(graph: &'a ScheduleGraph) -> Self {
        let mut members: FxHashMap<(&str, &str), Vec<TaskKey>> = FxHashMap::default();
        for key in 0..graph.len() as TaskKey {
            let task = graph.node(key);
            if let Some(group) = task.task_group.as_deref() {
                members
                    .entry((task.project.as_str(), group))
                    .or_default()
                    .push(key);
            }
        }
        Self { members }
    }

    fn open_members(&self, graph: &'a ScheduleGraph, key: TaskKey) -> Vec<String> {
        let task = graph.node(key);
        let Some(group) = task.depends_on_group.as_deref() else {
            return Vec::new();
        };
        self.members
            .get(&(task.project.as_str(), group))
            .map(|keys| {
                keys.iter()
                    .filter(|&&k| k != key && !graph.node(k).status.is_closed())
                    .map(|&k| graph.id(k).to_string())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// FS predecessors of `key` that are not Completed. A Cancelled
/// predecessor still blocks.
fn incomplete_fs_predecessors(
    graph: &ScheduleGraph,
    key: TaskKey,
) -> impl Iterator<Item = TaskKey> + '_ {
    graph
        .predecessor_edges(key)
        .iter()
        .filter(|e| e.dependency_type == DependencyType::FinishToStart)
        .filter(move |e| graph.node(e.other).status != TaskStatus::Completed)
        .map(|e| e.other)
}

/// Whether `key` still waits on an FS predecessor other than `completed`.
pub(crate) fn waits_on_others(graph: &ScheduleGraph, key: TaskKey, completed: TaskKey) -> bool {
    incomplete_fs_predecessors(graph, key).any(|p| p != completed)
}

fn state_for<'a>(
    graph: &'a ScheduleGraph,
    groups: &GroupIndex<'a>,
    key: TaskKey,
) -> BlockedState {
    let blocking: Vec<String> = incomplete_fs_predecessors(graph, key)
        .map(|k| graph.id(k).to_string())
        .collect();
    let blocking_group = groups.open_members(graph, key);
    BlockedState {
        task_id: graph.id(key).to_string(),
        is_blocked: !blocking.is_empty() || !blocking_group.is_empty(),
        blocking,
        blocking_group,
    }
}

/// Blocked state of one task, `None` if the id is unknown.
pub fn blocked_state(graph: &ScheduleGraph, id: &str) -> Option<BlockedState> {
    let key = graph.key(id)?;
    Some(state_for(graph, &GroupIndex::new(graph), key))
}

/// Blocked state of every task, in input order.
pub fn blocked_states(graph: &ScheduleGraph) -> Vec<BlockedState> {
    let groups = GroupIndex::new(graph);
    (0..graph.len() as TaskKey)
        .map(|key| state_for(graph, &groups, key))
        .collect()
}
