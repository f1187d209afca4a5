//! Project-scoped dependency graph.
//!
//! Tasks live in an arena indexed by interned keys; predecessor and
//! successor adjacency are kept as two parallel lists of edges so either
//! direction is a slice lookup.

use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use thiserror::Error;

use crate::cycle::would_create_cycle;
use crate::interner::{TaskIdInterner, TaskKey};
use crate::models::{Dependency, DependencyType, Task, TaskStatus};

/// Structural errors: invalid edges, cycles and malformed task dates.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Task cannot depend on itself: {0}")]
    SelfDependency(String),
    #[error("Task not found: {0}")]
    UnknownTask(String),
    #[error("Task {task_id} belongs to project {found:?}, not {expected:?}")]
    CrossProject {
        task_id: String,
        expected: String,
        found: String,
    },
    #[error("Duplicate task id: {0}")]
    DuplicateTask(String),
    #[error("Due date cannot be before start date for task {task_id} ({start} > {end})")]
    InconsistentDates {
        task_id: String,
        start: NaiveDate,
        end: NaiveDate,
    },
    #[error("Circular dependency detected: {}", .0.join(" → "))]
    CircularDependency(Vec<String>),
    #[error("Buffer {task_id} has {consumed} consumed days, outside 0..={size}")]
    InvalidBufferConsumption {
        task_id: String,
        consumed: i64,
        size: i64,
    },
    #[error("Shifting task {task_id} by {days} days leaves the supported date range")]
    DateOutOfRange { task_id: String, days: i64 },
}

/// One adjacency entry. `other` is the successor in a successor list and
/// the predecessor in a predecessor list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
    pub other: TaskKey,
    pub dependency_type: DependencyType,
    pub lag_days: i64,
}

/// Neighbor view handed out by the public accessors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Link<'a> {
    pub task_id: &'a str,
    pub dependency_type: DependencyType,
    pub lag_days: i64,
}

/// Immutable-by-default snapshot of one project's tasks and dependencies.
#[derive(Clone, Debug)]
pub struct ScheduleGraph {
    project: Option<String>,
    index: TaskIdInterner,
    tasks: Vec<Task>,
    successors: Vec<Vec<Edge>>,
    predecessors: Vec<Vec<Edge>>,
    /// Topological order, refreshed after every structural change.
    order: Vec<TaskKey>,
}

/// Reject a task whose own fields are malformed.
pub(crate) fn check_task(task: &Task) -> Result<(), GraphError> {
    if let Some(end) = task.end_date {
        if end < task.start_date {
            return Err(GraphError::InconsistentDates {
                task_id: task.id.clone(),
                start: task.start_date,
                end,
            });
        }
    }
    check_buffer(task, task.buffer_consumed_days)
}

fn check_buffer(task: &Task, consumed: Option<i64>) -> Result<(), GraphError> {
    match consumed {
        Some(consumed) if task.is_buffer() => {
            let size = task.duration_days();
            if (0..=size).contains(&consumed) {
                Ok(())
            } else {
                Err(GraphError::InvalidBufferConsumption {
                    task_id: task.id.clone(),
                    consumed,
                    size,
                })
            }
        }
        _ => Ok(()),
    }
}

impl ScheduleGraph {
    /// Build a graph from every supplied task and dependency.
    pub fn from_tasks(tasks: &[Task], dependencies: &[Dependency]) -> Result<Self, GraphError> {
        Self::build(None, tasks, dependencies)
    }

    /// Build the subgraph of `project`. Tasks of other projects are left
    /// out; an edge reaching one of them is rejected.
    pub fn for_project(
        project: &str,
        tasks: &[Task],
        dependencies: &[Dependency],
    ) -> Result<Self, GraphError> {
        Self::build(Some(project), tasks, dependencies)
    }

    fn build(
        project: Option<&str>,
        tasks: &[Task],
        dependencies: &[Dependency],
    ) -> Result<Self, GraphError> {
        let mut graph = Self {
            project: project.map(str::to_string),
            index: TaskIdInterner::with_capacity(tasks.len()),
            tasks: Vec::with_capacity(tasks.len()),
            successors: Vec::with_capacity(tasks.len()),
            predecessors: Vec::with_capacity(tasks.len()),
            order: Vec::new(),
        };

        // Out-of-scope tasks, remembered so edge errors can say why.
        let mut foreign: FxHashMap<&str, &str> = FxHashMap::default();

        for task in tasks {
            if let Some(p) = project {
                if task.project != p {
                    foreign.insert(task.id.as_str(), task.project.as_str());
                    continue;
                }
            }
            check_task(task)?;
            if graph.index.insert_unique(&task.id).is_none() {
                return Err(GraphError::DuplicateTask(task.id.clone()));
            }
            graph.tasks.push(task.clone());
            graph.successors.push(Vec::new());
            graph.predecessors.push(Vec::new());
        }

        for dep in dependencies {
            let pred = graph.resolve_endpoint(&dep.predecessor_id, &foreign)?;
            let succ = graph.resolve_endpoint(&dep.successor_id, &foreign)?;
            if pred == succ {
                return Err(GraphError::SelfDependency(dep.predecessor_id.clone()));
            }
            // Repeated pairs in bulk input overwrite: the later edge wins.
            graph.upsert_edge(pred, succ, dep.dependency_type, dep.lag_days);
        }

        graph.order = graph
            .kahn_order()
            .map_err(|stuck| GraphError::CircularDependency(graph.index.resolve_all(&stuck)))?;
        Ok(graph)
    }

    fn resolve_endpoint(
        &self,
        id: &str,
        foreign: &FxHashMap<&str, &str>,
    ) -> Result<TaskKey, GraphError> {
        if let Some(key) = self.index.get(id) {
            return Ok(key);
        }
        match (foreign.get(id), &self.project) {
            (Some(found), Some(expected)) => Err(GraphError::CrossProject {
                task_id: id.to_string(),
                expected: expected.clone(),
                found: (*found).to_string(),
            }),
            _ => Err(GraphError::UnknownTask(id.to_string())),
        }
    }

    /// Insert or update the `(pred, succ)` edge. Returns true if it was new.
    fn upsert_edge(
        &mut self,
        pred: TaskKey,
        succ: TaskKey,
        dependency_type: DependencyType,
        lag_days: i64,
    ) -> bool {
        let forward = Edge {
            other: succ,
            dependency_type,
            lag_days,
        };
        let backward = Edge {
            other: pred,
            dependency_type,
            lag_days,
        };
        let out = &mut self.successors[pred as usize];
        if let Some(existing) = out.iter_mut().find(|e| e.other == succ) {
            *existing = forward;
            if let Some(rev) = self.predecessors[succ as usize]
                .iter_mut()
                .find(|e| e.other == pred)
            {
                *rev = backward;
            }
            return false;
        }
        out.push(forward);
        self.predecessors[succ as usize].push(backward);
        true
    }

    /// Kahn's algorithm, ties broken by key (input) order.
    ///
    /// On failure returns one cycle as a closed key path `[x, .., x]`.
    fn kahn_order(&self) -> Result<Vec<TaskKey>, Vec<TaskKey>> {
        let n = self.tasks.len();
        let mut in_degree: Vec<usize> = self.predecessors.iter().map(Vec::len).collect();
        let mut queue: VecDeque<TaskKey> = (0..n as TaskKey)
            .filter(|&k| in_degree[k as usize] == 0)
            .collect();
        let mut order = Vec::with_capacity(n);

        while let Some(key) = queue.pop_front() {
            order.push(key);
            for edge in &self.successors[key as usize] {
                let degree = &mut in_degree[edge.other as usize];
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(edge.other);
                }
            }
        }

        if order.len() == n {
            return Ok(order);
        }
        let remaining: Vec<bool> = in_degree.iter().map(|&d| d > 0).collect();
        Err(self.extract_cycle(&remaining))
    }

    /// Every node Kahn could not release has a predecessor that is also
    /// unreleased, so walking predecessors inside that set must revisit a node.
    fn extract_cycle(&self, remaining: &[bool]) -> Vec<TaskKey> {
        let Some(start) = remaining.iter().position(|&r| r) else {
            return Vec::new();
        };
        let mut seen_at: FxHashMap<TaskKey, usize> = FxHashMap::default();
        let mut walk: Vec<TaskKey> = Vec::new();
        let mut current = start as TaskKey;

        loop {
            if let Some(&pos) = seen_at.get(&current) {
                // walk runs against edge direction; flip it and close the loop.
                let mut cycle: Vec<TaskKey> = walk[pos..].iter().rev().copied().collect();
                cycle.push(cycle[0]);
                return cycle;
            }
            seen_at.insert(current, walk.len());
            walk.push(current);
            match self.predecessors[current as usize]
                .iter()
                .find(|e| remaining[e.other as usize])
            {
                Some(edge) => current = edge.other,
                None => return walk,
            }
        }
    }

    fn refresh_order(&mut self) -> Result<(), GraphError> {
        self.order = self
            .kahn_order()
            .map_err(|stuck| GraphError::CircularDependency(self.index.resolve_all(&stuck)))?;
        Ok(())
    }

    // ----- lookups -------------------------------------------------------

    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.get(id).is_some()
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.index.get(id).map(|k| &self.tasks[k as usize])
    }

    /// Tasks in input order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn predecessors(&self, id: &str) -> Vec<Link<'_>> {
        self.links(id, &self.predecessors)
    }

    pub fn successors(&self, id: &str) -> Vec<Link<'_>> {
        self.links(id, &self.successors)
    }

    fn links<'a>(&'a self, id: &str, adjacency: &'a [Vec<Edge>]) -> Vec<Link<'a>> {
        let Some(key) = self.index.get(id) else {
            return Vec::new();
        };
        adjacency[key as usize]
            .iter()
            .map(|e| Link {
                task_id: self.index.resolve(e.other),
                dependency_type: e.dependency_type,
                lag_days: e.lag_days,
            })
            .collect()
    }

    /// Whole-project topological order: every predecessor before its successors.
    pub fn topological_order(&self) -> Vec<&str> {
        self.order.iter().map(|&k| self.index.resolve(k)).collect()
    }

    /// All edges, grouped by predecessor in input order.
    pub fn dependencies(&self) -> Vec<Dependency> {
        self.successors
            .iter()
            .enumerate()
            .flat_map(|(pred, edges)| {
                edges.iter().map(move |e| {
                    Dependency::new(
                        self.index.resolve(pred as TaskKey),
                        self.index.resolve(e.other),
                        e.dependency_type,
                        e.lag_days,
                    )
                })
            })
            .collect()
    }

    // ----- key-level access for the algorithms ---------------------------

    pub(crate) fn key(&self, id: &str) -> Option<TaskKey> {
        self.index.get(id)
    }

    pub(crate) fn id(&self, key: TaskKey) -> &str {
        self.index.resolve(key)
    }

    pub(crate) fn ids(&self, keys: &[TaskKey]) -> Vec<String> {
        self.index.resolve_all(keys)
    }

    pub(crate) fn node(&self, key: TaskKey) -> &Task {
        &self.tasks[key as usize]
    }

    pub(crate) fn successor_edges(&self, key: TaskKey) -> &[Edge] {
        &self.successors[key as usize]
    }

    pub(crate) fn predecessor_edges(&self, key: TaskKey) -> &[Edge] {
        &self.predecessors[key as usize]
    }

    pub(crate) fn order_keys(&self) -> &[TaskKey] {
        &self.order
    }

    // ----- mutation --------------------------------------------------------

    /// Add a dependency, or update type and lag if the pair already exists.
    ///
    /// Nothing changes when the edge is rejected.
    pub fn add_dependency(&mut self, dep: &Dependency) -> Result<(), GraphError> {
        let pred = self
            .key(&dep.predecessor_id)
            .ok_or_else(|| GraphError::UnknownTask(dep.predecessor_id.clone()))?;
        let succ = self
            .key(&dep.successor_id)
            .ok_or_else(|| GraphError::UnknownTask(dep.successor_id.clone()))?;
        if pred == succ {
            return Err(GraphError::SelfDependency(dep.predecessor_id.clone()));
        }

        let exists = self.successors[pred as usize]
            .iter()
            .any(|e| e.other == succ);
        if !exists {
            let check = would_create_cycle(self, &dep.predecessor_id, &dep.successor_id);
            if check.has_cycle {
                return Err(GraphError::CircularDependency(check.cycle_path));
            }
        }

        if self.upsert_edge(pred, succ, dep.dependency_type, dep.lag_days) {
            self.refresh_order()?;
        }
        Ok(())
    }

    /// Remove the `(predecessor, successor)` edge. Returns false if absent.
    pub fn remove_dependency(&mut self, predecessor_id: &str, successor_id: &str) -> bool {
        let (Some(pred), Some(succ)) = (self.key(predecessor_id), self.key(successor_id)) else {
            return false;
        };
        let out = &mut self.successors[pred as usize];
        let before = out.len();
        out.retain(|e| e.other != succ);
        if out.len() == before {
            return false;
        }
        self.predecessors[succ as usize].retain(|e| e.other != pred);
        // Removing an edge cannot introduce a cycle.
        self.order = self.kahn_order().unwrap_or_default();
        true
    }

    /// Overwrite a task's dates inside this snapshot.
    pub fn update_task_dates(
        &mut self,
        id: &str,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
    ) -> Result<(), GraphError> {
        let key = self
            .key(id)
            .ok_or_else(|| GraphError::UnknownTask(id.to_string()))?;
        let mut updated = self.tasks[key as usize].clone();
        updated.start_date = start_date;
        updated.end_date = end_date;
        check_task(&updated)?;
        self.tasks[key as usize] = updated;
        Ok(())
    }

    pub fn set_status(&mut self, id: &str, status: TaskStatus) -> Result<(), GraphError> {
        let key = self
            .key(id)
            .ok_or_else(|| GraphError::UnknownTask(id.to_string()))?;
        self.tasks[key as usize].status = status;
        Ok(())
    }

    pub fn set_buffer_consumed(&mut self, id: &str, days: i64) -> Result<(), GraphError> {
        let key = self
            .key(id)
            .ok_or_else(|| GraphError::UnknownTask(id.to_string()))?;
        let task = &mut self.tasks[key as usize];
        check_buffer(task, Some(days))?;
        task.buffer_consumed_days = Some(days);
        Ok(())
    }
}
