//! Date-cascade propagation.
//!
//! A date change on one task is pushed through its transitive successors.
//! Every moved successor is translated by its predecessor's shift, so its
//! duration is preserved and repeated edits compose: shifting by `d1` and
//! then `d2` lands where a single `d1 + d2` would. Nodes are finalized in
//! topological order once every incoming shift is known, so a task with
//! several moved predecessors takes the largest shift rather than whichever
//! path reached it first.
//!
//! The edge type selects which predecessor date carries the shift:
//!
//! | type | predecessor anchor | successor anchor |
//! |------|--------------------|------------------|
//! | FS   | finish             | start            |
//! | SS   | start              | start            |
//! | FF   | finish             | finish           |
//! | SF   | start              | finish           |
//!
//! Lag sets where a successor may sit, not how far it moves. Hammocks are
//! re-spanned instead of shifted, and buffers absorb delay into their
//! consumption before passing the rest on.

use chrono::NaiveDate;
use pyo3::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use thiserror::Error;

use crate::graph::{check_task, GraphError, ScheduleGraph};
use crate::interner::TaskKey;
use crate::models::{offset_date, DateField, DependencyType, Task};
use crate::policy::buffer::absorb;
use crate::policy::hammock::derive_span;
use crate::{log_changes, log_checks, log_debug};

/// Errors that reject a cascade as a whole.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CascadeError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("Hammock task dates are auto-calculated and cannot be changed manually: {0}")]
    HammockLocked(String),
    #[error("Cascade would leave task {task_id} ending before it starts ({start} > {end})")]
    InconsistentDates {
        task_id: String,
        start: NaiveDate,
        end: NaiveDate,
    },
    #[error("Cascade preview is stale for task {task_id}: {detail}")]
    StalePreview { task_id: String, detail: String },
}

/// Whether an outcome is for display or for persistence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CascadeMode {
    #[default]
    Preview,
    Apply,
}

impl CascadeMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Preview => "preview",
            Self::Apply => "apply",
        }
    }
}

/// One task moved by a cascade.
#[pyclass]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CascadeChange {
    #[pyo3(get)]
    pub task_id: String,
    /// The date the driving edge acts on.
    pub field: DateField,
    #[pyo3(get)]
    pub old_value: NaiveDate,
    #[pyo3(get)]
    pub new_value: NaiveDate,
    #[pyo3(get)]
    pub days_shift: i64,
    #[pyo3(get)]
    pub old_start_date: NaiveDate,
    #[pyo3(get)]
    pub new_start_date: NaiveDate,
    #[pyo3(get)]
    pub old_end_date: Option<NaiveDate>,
    #[pyo3(get)]
    pub new_end_date: Option<NaiveDate>,
    /// Type of the edge that produced the shift.
    pub dependency_type: Option<DependencyType>,
    /// Hammock span recomputed rather than shifted.
    #[pyo3(get)]
    pub recomputed: bool,
}

#[pymethods]
impl CascadeChange {
    #[getter(field)]
    fn py_field(&self) -> &'static str {
        self.field.label()
    }

    #[getter(dependency_type)]
    fn py_dependency_type(&self) -> Option<&'static str> {
        self.dependency_type.map(DependencyType::short_code)
    }

    fn __repr__(&self) -> String {
        format!(
            "CascadeChange(task_id={:?}, {}: {} -> {}, shift={:+})",
            self.task_id,
            self.field.label(),
            self.old_value,
            self.new_value,
            self.days_shift
        )
    }
}

/// New consumption for a buffer that absorbed delay.
#[pyclass]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferUpdate {
    #[pyo3(get)]
    pub task_id: String,
    #[pyo3(get)]
    pub old_consumed_days: i64,
    #[pyo3(get)]
    pub new_consumed_days: i64,
    #[pyo3(get)]
    pub absorbed_days: i64,
}

#[pymethods]
impl BufferUpdate {
    fn __repr__(&self) -> String {
        format!(
            "BufferUpdate(task_id={:?}, consumed={} -> {})",
            self.task_id, self.old_consumed_days, self.new_consumed_days
        )
    }
}

/// Everything a cascade wants persisted. The host must write all of it in
/// one transaction or none of it.
#[pyclass]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CascadeOutcome {
    pub mode: CascadeMode,
    /// Task whose edit or completion started the cascade.
    #[pyo3(get)]
    pub changed_task_id: String,
    /// The edit that was cascaded; unset for completion advancement.
    pub changed_field: Option<DateField>,
    #[pyo3(get)]
    pub date_shift_days: i64,
    /// Dates of the edited task before the edit.
    #[pyo3(get)]
    pub root_old_start_date: Option<NaiveDate>,
    #[pyo3(get)]
    pub root_old_end_date: Option<NaiveDate>,
    /// New dates of the edited task itself (not part of `changes`).
    #[pyo3(get)]
    pub root_start_date: Option<NaiveDate>,
    #[pyo3(get)]
    pub root_end_date: Option<NaiveDate>,
    /// Moved tasks in topological order.
    #[pyo3(get)]
    pub changes: Vec<CascadeChange>,
    #[pyo3(get)]
    pub buffer_updates: Vec<BufferUpdate>,
    #[pyo3(get)]
    pub total_affected: usize,
}

#[pymethods]
impl CascadeOutcome {
    #[getter(mode)]
    fn py_mode(&self) -> &'static str {
        self.mode.label()
    }

    #[getter(changed_field)]
    fn py_changed_field(&self) -> Option<&'static str> {
        self.changed_field.map(DateField::label)
    }

    fn __len__(&self) -> usize {
        self.changes.len()
    }

    fn __repr__(&self) -> String {
        format!(
            "CascadeOutcome(mode={}, changed_task_id={:?}, total_affected={}, buffers={})",
            self.mode.label(),
            self.changed_task_id,
            self.total_affected,
            self.buffer_updates.len()
        )
    }
}

impl CascadeOutcome {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.buffer_updates.is_empty()
    }

    /// Same content, marked for persistence.
    pub fn into_apply(mut self) -> Self {
        self.mode = CascadeMode::Apply;
        self
    }

    /// Commit this outcome into a snapshot, all or nothing.
    ///
    /// Every target is checked before anything is written, so a failure
    /// leaves the graph untouched.
    pub fn apply_to(&self, graph: &mut ScheduleGraph) -> Result<(), GraphError> {
        let mut writes: Vec<(&str, NaiveDate, Option<NaiveDate>)> =
            Vec::with_capacity(self.changes.len() + 1);
        if let Some(start) = self.root_start_date {
            writes.push((&self.changed_task_id, start, self.root_end_date));
        }
        for change in &self.changes {
            writes.push((&change.task_id, change.new_start_date, change.new_end_date));
        }

        for (id, start, end) in &writes {
            let mut updated = graph
                .task(id)
                .ok_or_else(|| GraphError::UnknownTask(id.to_string()))?
                .clone();
            updated.start_date = *start;
            updated.end_date = *end;
            check_task(&updated)?;
        }
        for update in &self.buffer_updates {
            let mut updated = graph
                .task(&update.task_id)
                .ok_or_else(|| GraphError::UnknownTask(update.task_id.clone()))?
                .clone();
            updated.buffer_consumed_days = Some(update.new_consumed_days);
            check_task(&updated)?;
        }

        for (id, start, end) in writes {
            graph.update_task_dates(id, start, end)?;
        }
        for update in &self.buffer_updates {
            graph.set_buffer_consumed(&update.task_id, update.new_consumed_days)?;
        }
        Ok(())
    }
}

/// Successor moved directly by completion advancement.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Seed {
    pub key: TaskKey,
    pub shift: i64,
}

/// Per-node anchor shifts accumulated during propagation.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Shift {
    pub start: i64,
    pub finish: i64,
    pub driver: Option<DependencyType>,
}

impl Shift {
    fn anchor(&self, on_start: bool) -> i64 {
        if on_start {
            self.start
        } else {
            self.finish
        }
    }

    fn is_zero(&self) -> bool {
        self.start == 0 && self.finish == 0
    }
}

/// `date + days` for `task`, or an error past chrono's date range.
fn shift_date(task: &Task, date: NaiveDate, days: i64) -> Result<NaiveDate, GraphError> {
    offset_date(date, days).ok_or_else(|| GraphError::DateOutOfRange {
        task_id: task.id.clone(),
        days,
    })
}

/// Cascade computation over one graph snapshot.
pub struct CascadeEngine<'a> {
    graph: &'a ScheduleGraph,
    verbosity: u8,
}

impl<'a> CascadeEngine<'a> {
    pub fn new(graph: &'a ScheduleGraph) -> Self {
        Self { graph, verbosity: 0 }
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Compute the cascade without marking it for persistence.
    pub fn preview(
        &self,
        changed_task_id: &str,
        date_shift_days: i64,
        changed_field: DateField,
    ) -> Result<CascadeOutcome, CascadeError> {
        self.compute(changed_task_id, date_shift_days, changed_field)
    }

    /// Produce an outcome marked for persistence.
    ///
    /// With `previous`, the earlier preview must describe the same edit and
    /// still match this snapshot; it is then returned as-is, so the host
    /// commits exactly what the user confirmed. Without it, the cascade is
    /// computed fresh.
    pub fn apply(
        &self,
        changed_task_id: &str,
        date_shift_days: i64,
        changed_field: DateField,
        previous: Option<&CascadeOutcome>,
    ) -> Result<CascadeOutcome, CascadeError> {
        let Some(preview) = previous else {
            return Ok(self
                .compute(changed_task_id, date_shift_days, changed_field)?
                .into_apply());
        };

        if preview.changed_task_id != changed_task_id
            || preview.date_shift_days != date_shift_days
            || preview.changed_field != Some(changed_field)
        {
            return Err(CascadeError::StalePreview {
                task_id: changed_task_id.to_string(),
                detail: format!(
                    "preview was computed for {:?} {} {:+}, not {} {:+}",
                    preview.changed_task_id,
                    preview.changed_field.map_or("completion", DateField::label),
                    preview.date_shift_days,
                    changed_field.label(),
                    date_shift_days
                ),
            });
        }
        self.validate_preview(preview)?;
        Ok(preview.clone().into_apply())
    }

    /// Check that every date a preview expects to overwrite is still current,
    /// the edited task's own dates included.
    pub fn validate_preview(&self, preview: &CascadeOutcome) -> Result<(), CascadeError> {
        if let Some(old_start) = preview.root_old_start_date {
            let task = self
                .graph
                .task(&preview.changed_task_id)
                .ok_or_else(|| GraphError::UnknownTask(preview.changed_task_id.clone()))?;
            if task.start_date != old_start || task.end_date != preview.root_old_end_date {
                return Err(CascadeError::StalePreview {
                    task_id: preview.changed_task_id.clone(),
                    detail: format!(
                        "expected {} .. {:?}, found {} .. {:?}",
                        old_start, preview.root_old_end_date, task.start_date, task.end_date
                    ),
                });
            }
        }
        for change in &preview.changes {
            let task = self
                .graph
                .task(&change.task_id)
                .ok_or_else(|| GraphError::UnknownTask(change.task_id.clone()))?;
            if task.start_date != change.old_start_date || task.end_date != change.old_end_date {
                return Err(CascadeError::StalePreview {
                    task_id: change.task_id.clone(),
                    detail: format!(
                        "expected {} .. {:?}, found {} .. {:?}",
                        change.old_start_date, change.old_end_date, task.start_date, task.end_date
                    ),
                });
            }
        }
        for update in &preview.buffer_updates {
            let task = self
                .graph
                .task(&update.task_id)
                .ok_or_else(|| GraphError::UnknownTask(update.task_id.clone()))?;
            let consumed = task.buffer_consumed_days.unwrap_or(0);
            if consumed != update.old_consumed_days {
                return Err(CascadeError::StalePreview {
                    task_id: update.task_id.clone(),
                    detail: format!(
                        "expected {} consumed buffer days, found {}",
                        update.old_consumed_days, consumed
                    ),
                });
            }
        }
        Ok(())
    }

    /// Propagate a shift of `changed_field` on one task to its dependents.
    pub fn compute(
        &self,
        changed_task_id: &str,
        date_shift_days: i64,
        changed_field: DateField,
    ) -> Result<CascadeOutcome, CascadeError> {
        let graph = self.graph;
        let root = graph
            .key(changed_task_id)
            .ok_or_else(|| GraphError::UnknownTask(changed_task_id.to_string()))?;
        let task = graph.node(root);

        if task.is_hammock() {
            return Err(CascadeError::HammockLocked(changed_task_id.to_string()));
        }

        let root_shift = match changed_field {
            // Moving the start drags the whole bar.
            DateField::StartDate => Shift {
                start: date_shift_days,
                finish: date_shift_days,
                driver: None,
            },
            DateField::EndDate => Shift {
                start: 0,
                finish: date_shift_days,
                driver: None,
            },
        };
        let new_start = shift_date(task, task.start_date, root_shift.start)?;
        let new_end = match (task.end_date, changed_field) {
            (Some(end), _) => Some(shift_date(task, end, root_shift.finish)?),
            (None, DateField::EndDate) => Some(shift_date(task, task.start_date, date_shift_days)?),
            (None, DateField::StartDate) => None,
        };
        if let Some(end) = new_end {
            if end < new_start {
                return Err(CascadeError::InconsistentDates {
                    task_id: changed_task_id.to_string(),
                    start: new_start,
                    end,
                });
            }
        }

        let mut outcome = CascadeOutcome {
            changed_task_id: changed_task_id.to_string(),
            changed_field: Some(changed_field),
            date_shift_days,
            root_old_start_date: Some(task.start_date),
            root_old_end_date: task.end_date,
            root_start_date: Some(new_start),
            root_end_date: new_end,
            ..CascadeOutcome::default()
        };

        if date_shift_days == 0 {
            return Ok(outcome);
        }

        log_changes!(
            self.verbosity,
            "Cascade from {} ({} {:+} days)",
            changed_task_id,
            changed_field.label(),
            date_shift_days
        );

        let (changes, buffer_updates) = self.propagate(Some((root, root_shift)), &[])?;
        outcome.total_affected = changes.len();
        outcome.changes = changes;
        outcome.buffer_updates = buffer_updates;
        Ok(outcome)
    }

    /// Cascade from successors a completed task moved directly.
    pub(crate) fn advance(
        &self,
        completed_task_id: &str,
        seeds: &[Seed],
    ) -> Result<CascadeOutcome, CascadeError> {
        log_changes!(
            self.verbosity,
            "Advancing {} successors of completed task {}",
            seeds.len(),
            completed_task_id
        );
        let (changes, buffer_updates) = self.propagate(None, seeds)?;
        Ok(CascadeOutcome {
            changed_task_id: completed_task_id.to_string(),
            total_affected: changes.len(),
            changes,
            buffer_updates,
            ..CascadeOutcome::default()
        })
    }

    /// Propagate from an edited root and/or directly moved seeds.
    ///
    /// Seeds are reported as changes; the root is not.
    pub(crate) fn propagate(
        &self,
        root: Option<(TaskKey, Shift)>,
        seeds: &[Seed],
    ) -> Result<(Vec<CascadeChange>, Vec<BufferUpdate>), CascadeError> {
        let graph = self.graph;
        let root_key = root.map(|(k, _)| k);

        let seed_shift: FxHashMap<TaskKey, i64> =
            seeds.iter().map(|s| (s.key, s.shift)).collect();
        let reachable = self.reachable_from(root_key, seeds);

        let mut shifts: Vec<Shift> = vec![Shift::default(); graph.len()];
        let mut consumed: FxHashMap<TaskKey, (i64, i64)> = FxHashMap::default();
        if let Some((key, shift)) = root {
            shifts[key as usize] = shift;
        }

        for &key in graph.order_keys() {
            let idx = key as usize;
            if !reachable[idx] || root_key == Some(key) {
                continue;
            }
            let node = graph.node(key);
            if node.is_hammock() {
                // Re-spanned after propagation; never pushes its successors.
                continue;
            }

            let mut best: Option<(i64, Option<DependencyType>)> = seed_shift
                .get(&key)
                .map(|&s| (s, Some(DependencyType::FinishToStart)));

            for edge in graph.predecessor_edges(key) {
                if graph.node(edge.other).is_hammock() {
                    continue;
                }
                let on_start = edge.dependency_type.anchored_on_predecessor_start();
                let candidate = shifts[edge.other as usize].anchor(on_start);
                if candidate == 0 {
                    continue;
                }
                log_checks!(
                    self.verbosity,
                    "  {} -[{}]-> {}: predecessor moved {:+}",
                    graph.id(edge.other),
                    edge.dependency_type,
                    graph.id(key),
                    candidate
                );
                if best.map_or(true, |(b, _)| candidate > b) {
                    best = Some((candidate, Some(edge.dependency_type)));
                }
            }

            let Some((mut shift, driver)) = best else {
                continue;
            };

            if node.is_buffer() && shift > 0 {
                let before = node.buffer_consumed_days.unwrap_or(0);
                let absorption = absorb(node.duration_days(), before, shift);
                if absorption.absorbed > 0 {
                    log_changes!(
                        self.verbosity,
                        "  buffer {} absorbs {} days ({} -> {} consumed)",
                        graph.id(key),
                        absorption.absorbed,
                        before,
                        absorption.consumed_after
                    );
                    consumed.insert(key, (before, absorption.consumed_after));
                }
                shift = absorption.residual;
            }

            if shift == 0 {
                log_checks!(self.verbosity, "  {} absorbs the move", graph.id(key));
                continue;
            }
            shifts[idx] = Shift {
                start: shift,
                finish: shift,
                driver,
            };
        }

        self.collect_changes(root_key, &shifts, &reachable, consumed)
    }

    fn reachable_from(&self, root: Option<TaskKey>, seeds: &[Seed]) -> Vec<bool> {
        let graph = self.graph;
        let mut seen = vec![false; graph.len()];
        let mut queue: VecDeque<TaskKey> =
            root.into_iter().chain(seeds.iter().map(|s| s.key)).collect();
        for &k in &queue {
            seen[k as usize] = true;
        }
        while let Some(key) = queue.pop_front() {
            for edge in graph.successor_edges(key) {
                if !seen[edge.other as usize] {
                    seen[edge.other as usize] = true;
                    queue.push_back(edge.other);
                }
            }
        }
        seen
    }

    /// Emit moved tasks and re-spanned hammocks in topological order.
    fn collect_changes(
        &self,
        root: Option<TaskKey>,
        shifts: &[Shift],
        reachable: &[bool],
        consumed: FxHashMap<TaskKey, (i64, i64)>,
    ) -> Result<(Vec<CascadeChange>, Vec<BufferUpdate>), CascadeError> {
        let graph = self.graph;

        // (start, finish) of every task once its shift is applied
        let mut new_dates: Vec<(NaiveDate, NaiveDate)> = Vec::with_capacity(graph.len());
        for (key, shift) in shifts.iter().enumerate() {
            let t = graph.node(key as TaskKey);
            new_dates.push((
                shift_date(t, t.start_date, shift.start)?,
                shift_date(t, t.finish_or_start(), shift.finish)?,
            ));
        }

        let moved: FxHashSet<TaskKey> = (0..graph.len() as TaskKey)
            .filter(|&k| !shifts[k as usize].is_zero())
            .collect();

        let mut changes = Vec::new();
        let mut buffer_updates = Vec::new();

        for &key in graph.order_keys() {
            if root == Some(key) {
                continue;
            }
            let node = graph.node(key);

            if node.is_hammock() {
                let touches_moved = graph
                    .predecessor_edges(key)
                    .iter()
                    .chain(graph.successor_edges(key))
                    .any(|e| moved.contains(&e.other));
                if !touches_moved {
                    continue;
                }
                let (start, end) = derive_span(graph, key, |k| new_dates[k as usize])?;
                if end < start {
                    return Err(CascadeError::InconsistentDates {
                        task_id: node.id.clone(),
                        start,
                        end,
                    });
                }
                if let Some(change) = hammock_change(node, start, end) {
                    log_changes!(
                        self.verbosity,
                        "  hammock {} re-spanned to {} .. {}",
                        node.id,
                        start,
                        end
                    );
                    changes.push(change);
                }
                continue;
            }

            if let Some((before, after)) = consumed.get(&key) {
                buffer_updates.push(BufferUpdate {
                    task_id: node.id.clone(),
                    old_consumed_days: *before,
                    new_consumed_days: *after,
                    absorbed_days: after - before,
                });
            }

            let shift = shifts[key as usize];
            if shift.is_zero() || !reachable[key as usize] {
                continue;
            }
            let change = shifted_change(node, shift, new_dates[key as usize]);
            log_changes!(
                self.verbosity,
                "  {} {} {} -> {} ({:+})",
                change.task_id,
                change.field.label(),
                change.old_value,
                change.new_value,
                change.days_shift
            );
            changes.push(change);
        }

        log_debug!(
            self.verbosity,
            "Cascade produced {} changes, {} buffer updates",
            changes.len(),
            buffer_updates.len()
        );
        Ok((changes, buffer_updates))
    }
}

fn shifted_change(
    node: &Task,
    shift: Shift,
    (start, finish): (NaiveDate, NaiveDate),
) -> CascadeChange {
    let new_end_date = node.end_date.map(|_| finish);
    let field = match (shift.driver, node.end_date) {
        (Some(t), Some(_)) if t.constrains_successor_finish() => DateField::EndDate,
        _ => DateField::StartDate,
    };
    let (old_value, new_value, days_shift) = match (field, node.end_date) {
        (DateField::EndDate, Some(old)) => (old, finish, shift.finish),
        _ => (node.start_date, start, shift.start),
    };
    CascadeChange {
        task_id: node.id.clone(),
        field,
        old_value,
        new_value,
        days_shift,
        old_start_date: node.start_date,
        new_start_date: start,
        old_end_date: node.end_date,
        new_end_date,
        dependency_type: shift.driver,
        recomputed: false,
    }
}

fn hammock_change(node: &Task, start: NaiveDate, end: NaiveDate) -> Option<CascadeChange> {
    let old_end = node.finish_or_start();
    if start == node.start_date && end == old_end {
        return None;
    }
    let (field, old_value, new_value) = if start != node.start_date {
        (DateField::StartDate, node.start_date, start)
    } else {
        (DateField::EndDate, old_end, end)
    };
    Some(CascadeChange {
        task_id: node.id.clone(),
        field,
        old_value,
        new_value,
        days_shift: (new_value - old_value).num_days(),
        old_start_date: node.start_date,
        new_start_date: start,
        old_end_date: node.end_date,
        new_end_date: Some(end),
        dependency_type: None,
        recomputed: true,
    })
}

/// Preview the cascade of shifting `changed_field` of one task by `date_shift_days`.
pub fn compute_cascade(
    graph: &ScheduleGraph,
    changed_task_id: &str,
    date_shift_days: i64,
    changed_field: DateField,
) -> Result<CascadeOutcome, CascadeError> {
    CascadeEngine::new(graph).compute(changed_task_id, date_shift_days, changed_field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Dependency, SchedulingType};
    use chrono::Duration;

    fn day(d: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 6).unwrap() + Duration::days(d)
    }

    fn task(id: &str, start: i64, end: i64) -> Task {
        Task::new(id, day(start), Some(day(end)))
    }

    fn build(tasks: Vec<Task>, deps: Vec<Dependency>) -> ScheduleGraph {
        ScheduleGraph::from_tasks(&tasks, &deps).unwrap()
    }

    fn shift_of(outcome: &CascadeOutcome, id: &str) -> Option<i64> {
        outcome
            .changes
            .iter()
            .find(|c| c.task_id == id)
            .map(|c| c.days_shift)
    }

    #[test]
    fn test_single_successor_fs() {
        let g = build(
            vec![task("A", 0, 5), task("B", 5, 10)],
            vec![Dependency::fs("A", "B")],
        );
        let outcome = compute_cascade(&g, "A", 2, DateField::EndDate).unwrap();

        assert_eq!(outcome.changes.len(), 1);
        assert_eq!(outcome.total_affected, 1);
        let change = &outcome.changes[0];
        assert_eq!(change.task_id, "B");
        assert_eq!(change.field, DateField::StartDate);
        assert_eq!(change.new_start_date, day(7));
        assert_eq!(change.new_end_date, Some(day(12)));
        assert_eq!(change.days_shift, 2);
        assert_eq!(change.dependency_type, Some(DependencyType::FinishToStart));
        assert_eq!(outcome.root_old_end_date, Some(day(5)));
        assert_eq!(outcome.root_end_date, Some(day(7)));
        assert_eq!(outcome.root_start_date, Some(day(0)));
        assert_eq!(outcome.changed_field, Some(DateField::EndDate));
        assert_eq!(outcome.date_shift_days, 2);
        assert_eq!(outcome.mode, CascadeMode::Preview);
    }

    #[test]
    fn test_chain_moves_every_successor() {
        let g = build(
            vec![task("A", 0, 5), task("B", 5, 10), task("C", 10, 15)],
            vec![Dependency::fs("A", "B"), Dependency::fs("B", "C")],
        );
        let outcome = compute_cascade(&g, "A", 3, DateField::StartDate).unwrap();
        assert_eq!(outcome.changes.len(), 2);
        assert_eq!(shift_of(&outcome, "B"), Some(3));
        assert_eq!(shift_of(&outcome, "C"), Some(3));
        assert_eq!(outcome.changes[1].new_start_date, day(13));
    }

    #[test]
    fn test_zero_shift_is_empty() {
        let g = build(
            vec![task("A", 0, 5), task("B", 5, 10)],
            vec![Dependency::fs("A", "B")],
        );
        let outcome = compute_cascade(&g, "A", 0, DateField::EndDate).unwrap();
        assert!(outcome.is_empty());
        assert_eq!(outcome.total_affected, 0);
    }

    #[test]
    fn test_successor_with_slack_is_still_translated() {
        let g = build(
            vec![task("A", 0, 5), task("B", 8, 10), task("C", 10, 12)],
            vec![Dependency::fs("A", "B"), Dependency::fs("B", "C")],
        );
        let outcome = compute_cascade(&g, "A", 2, DateField::EndDate).unwrap();
        assert_eq!(shift_of(&outcome, "B"), Some(2));
        assert_eq!(shift_of(&outcome, "C"), Some(2));
        assert_eq!(outcome.changes[0].new_start_date, day(10));
    }

    #[test]
    fn test_opposite_shifts_cancel_out() {
        let mut g = build(
            vec![task("A", 0, 5), task("B", 8, 10)],
            vec![Dependency::fs("A", "B")],
        );
        for shift in [5, -5] {
            compute_cascade(&g, "A", shift, DateField::EndDate)
                .unwrap()
                .apply_to(&mut g)
                .unwrap();
        }
        assert_eq!(g.task("A").unwrap().end_date, Some(day(5)));
        assert_eq!(g.task("B").unwrap().start_date, day(8));
        assert_eq!(g.task("B").unwrap().end_date, Some(day(10)));
    }

    #[test]
    fn test_lag_does_not_change_the_shift() {
        let g = build(
            vec![task("A", 0, 5), task("B", 7, 9)],
            vec![Dependency::new("A", "B", DependencyType::FinishToStart, 2)],
        );
        let outcome = compute_cascade(&g, "A", 1, DateField::EndDate).unwrap();
        assert_eq!(outcome.changes[0].days_shift, 1);
        assert_eq!(outcome.changes[0].new_start_date, day(8));
    }

    #[test]
    fn test_multi_predecessor_takes_max_shift() {
        let g = build(
            vec![
                task("R", 0, 2),
                task("A", 2, 4),
                task("B", 2, 6),
                task("C", 6, 8),
            ],
            vec![
                Dependency::fs("R", "A"),
                Dependency::fs("R", "B"),
                Dependency::fs("A", "C"),
                Dependency::fs("B", "C"),
            ],
        );
        let engine = CascadeEngine::new(&g);
        let a = g.key("A").unwrap();
        let b = g.key("B").unwrap();
        let (changes, _) = engine
            .propagate(
                None,
                &[Seed { key: a, shift: 2 }, Seed { key: b, shift: 5 }],
            )
            .unwrap();
        let c = changes.iter().find(|c| c.task_id == "C").unwrap();
        assert_eq!(c.days_shift, 5);
        assert_eq!(c.new_start_date, day(11));
    }

    #[test]
    fn test_diamond_not_first_visit() {
        // R -> BUF -> C is visited first but only passes 1 day through the buffer
        let g = build(
            vec![
                task("R", 0, 2),
                task("BUF", 2, 4).with_scheduling_type(SchedulingType::Buffer),
                task("A", 2, 6),
                task("C", 6, 8),
            ],
            vec![
                Dependency::fs("R", "BUF"),
                Dependency::fs("R", "A"),
                Dependency::fs("BUF", "C"),
                Dependency::fs("A", "C"),
            ],
        );
        let outcome = compute_cascade(&g, "R", 3, DateField::EndDate).unwrap();
        assert_eq!(shift_of(&outcome, "BUF"), Some(1));
        assert_eq!(shift_of(&outcome, "A"), Some(3));
        assert_eq!(shift_of(&outcome, "C"), Some(3));
        assert_eq!(outcome.buffer_updates[0].new_consumed_days, 2);
    }

    #[test]
    fn test_start_to_start_ignores_finish_resize() {
        let g = build(
            vec![task("A", 0, 5), task("B", 0, 3)],
            vec![Dependency::new("A", "B", DependencyType::StartToStart, 0)],
        );
        let resized = compute_cascade(&g, "A", 4, DateField::EndDate).unwrap();
        assert!(resized.changes.is_empty());

        let moved = compute_cascade(&g, "A", 4, DateField::StartDate).unwrap();
        assert_eq!(shift_of(&moved, "B"), Some(4));
    }

    #[test]
    fn test_finish_to_finish_reports_end_field() {
        let g = build(
            vec![task("A", 0, 5), task("B", 2, 5)],
            vec![Dependency::new("A", "B", DependencyType::FinishToFinish, 0)],
        );
        let outcome = compute_cascade(&g, "A", 2, DateField::EndDate).unwrap();
        let change = &outcome.changes[0];
        assert_eq!(change.field, DateField::EndDate);
        assert_eq!(change.old_value, day(5));
        assert_eq!(change.new_value, day(7));
        assert_eq!(change.new_start_date, day(4));
    }

    #[test]
    fn test_start_to_finish_anchors_on_predecessor_start() {
        let g = build(
            vec![task("A", 4, 8), task("B", 0, 4)],
            vec![Dependency::new("A", "B", DependencyType::StartToFinish, 0)],
        );
        let outcome = compute_cascade(&g, "A", 2, DateField::StartDate).unwrap();
        let change = &outcome.changes[0];
        assert_eq!(change.field, DateField::EndDate);
        assert_eq!(change.new_end_date, Some(day(6)));
        assert_eq!(change.new_start_date, day(2));
    }

    #[test]
    fn test_pull_translates_fan_in() {
        // Only A moves; C follows it and B stays where it is
        let g = build(
            vec![task("A", 0, 5), task("B", 0, 4), task("C", 5, 7)],
            vec![Dependency::fs("A", "C"), Dependency::fs("B", "C")],
        );
        let outcome = compute_cascade(&g, "A", -3, DateField::StartDate).unwrap();
        assert_eq!(outcome.changes.len(), 1);
        assert_eq!(shift_of(&outcome, "C"), Some(-3));
        assert_eq!(outcome.changes[0].new_start_date, day(2));
    }

    #[test]
    fn test_pull_translates_chain() {
        let g = build(
            vec![task("A", 0, 5), task("B", 5, 10), task("C", 12, 15)],
            vec![Dependency::fs("A", "B"), Dependency::fs("B", "C")],
        );
        let outcome = compute_cascade(&g, "A", -2, DateField::StartDate).unwrap();
        assert_eq!(shift_of(&outcome, "B"), Some(-2));
        assert_eq!(shift_of(&outcome, "C"), Some(-2));
    }

    #[test]
    fn test_root_end_before_start_rejected() {
        let g = build(vec![task("A", 0, 2)], vec![]);
        let err = compute_cascade(&g, "A", -3, DateField::EndDate).unwrap_err();
        assert!(matches!(err, CascadeError::InconsistentDates { .. }));
    }

    #[test]
    fn test_unknown_task() {
        let g = build(vec![task("A", 0, 2)], vec![]);
        let err = compute_cascade(&g, "Z", 1, DateField::StartDate).unwrap_err();
        assert_eq!(err, CascadeError::Graph(GraphError::UnknownTask("Z".to_string())));
    }

    #[test]
    fn test_huge_shift_is_an_error() {
        let g = build(
            vec![task("A", 0, 5), task("B", 5, 10)],
            vec![Dependency::fs("A", "B")],
        );
        let err = compute_cascade(&g, "A", 1_000_000_000, DateField::StartDate).unwrap_err();
        assert_eq!(
            err,
            CascadeError::Graph(GraphError::DateOutOfRange {
                task_id: "A".to_string(),
                days: 1_000_000_000,
            })
        );
        assert!(compute_cascade(&g, "A", i64::MIN, DateField::EndDate).is_err());
    }

    #[test]
    fn test_successor_past_date_range_is_an_error() {
        let late = NaiveDate::MAX - Duration::days(2);
        let g = build(
            vec![task("A", 0, 5), Task::new("B", late, Some(NaiveDate::MAX))],
            vec![Dependency::fs("A", "B")],
        );
        let err = compute_cascade(&g, "A", 5, DateField::EndDate).unwrap_err();
        assert!(matches!(
            err,
            CascadeError::Graph(GraphError::DateOutOfRange { task_id, days: 5 }) if task_id == "B"
        ));
    }

    #[test]
    fn test_buffer_absorbs_then_overflows() {
        let g = build(
            vec![
                task("A", 0, 5),
                task("BUF", 5, 8).with_scheduling_type(SchedulingType::Buffer),
                task("Z", 8, 10),
            ],
            vec![Dependency::fs("A", "BUF"), Dependency::fs("BUF", "Z")],
        );

        let small = compute_cascade(&g, "A", 2, DateField::EndDate).unwrap();
        assert!(small.changes.is_empty());
        assert_eq!(small.buffer_updates.len(), 1);
        assert_eq!(small.buffer_updates[0].new_consumed_days, 2);

        let large = compute_cascade(&g, "A", 5, DateField::EndDate).unwrap();
        assert_eq!(large.buffer_updates[0].absorbed_days, 3);
        assert_eq!(large.buffer_updates[0].new_consumed_days, 3);
        assert_eq!(shift_of(&large, "BUF"), Some(2));
        assert_eq!(shift_of(&large, "Z"), Some(2));
    }

    #[test]
    fn test_hammock_respans_instead_of_pushing() {
        let g = build(
            vec![
                task("A", 0, 5),
                task("H", 5, 10).with_scheduling_type(SchedulingType::Hammock),
                task("Z", 10, 12),
            ],
            vec![Dependency::fs("A", "H"), Dependency::fs("H", "Z")],
        );
        let outcome = compute_cascade(&g, "A", 2, DateField::EndDate).unwrap();
        assert_eq!(outcome.changes.len(), 1);
        let change = &outcome.changes[0];
        assert_eq!(change.task_id, "H");
        assert!(change.recomputed);
        assert_eq!(change.new_start_date, day(7));
        assert_eq!(change.new_end_date, Some(day(10)));
    }

    #[test]
    fn test_hammock_crossing_rejected() {
        let g = build(
            vec![
                task("A", 0, 5),
                task("H", 5, 10).with_scheduling_type(SchedulingType::Hammock),
                task("Z", 10, 12),
            ],
            vec![Dependency::fs("A", "H"), Dependency::fs("H", "Z")],
        );
        let err = compute_cascade(&g, "A", 8, DateField::EndDate).unwrap_err();
        assert!(matches!(err, CascadeError::InconsistentDates { task_id, .. } if task_id == "H"));
    }

    #[test]
    fn test_hammock_cannot_be_edited() {
        let g = build(
            vec![task("H", 0, 3).with_scheduling_type(SchedulingType::Hammock)],
            vec![],
        );
        let err = compute_cascade(&g, "H", 1, DateField::EndDate).unwrap_err();
        assert_eq!(err, CascadeError::HammockLocked("H".to_string()));
    }

    #[test]
    fn test_apply_reuses_validated_preview() {
        let g = build(
            vec![task("A", 0, 5), task("B", 5, 10)],
            vec![Dependency::fs("A", "B")],
        );
        let engine = CascadeEngine::new(&g);
        let preview = engine.preview("A", 2, DateField::EndDate).unwrap();
        let applied = engine.apply("A", 2, DateField::EndDate, Some(&preview)).unwrap();
        assert_eq!(applied.mode, CascadeMode::Apply);
        assert_eq!(applied.changes, preview.changes);

        let fresh = engine.apply("A", 2, DateField::EndDate, None).unwrap();
        assert_eq!(fresh.changes, preview.changes);
    }

    #[test]
    fn test_apply_rejects_stale_preview() {
        let mut g = build(
            vec![task("A", 0, 5), task("B", 5, 10)],
            vec![Dependency::fs("A", "B")],
        );
        let preview = compute_cascade(&g, "A", 2, DateField::EndDate).unwrap();
        g.update_task_dates("B", day(6), Some(day(11))).unwrap();

        let err = CascadeEngine::new(&g)
            .apply("A", 2, DateField::EndDate, Some(&preview))
            .unwrap_err();
        assert!(matches!(err, CascadeError::StalePreview { task_id, .. } if task_id == "B"));
    }

    #[test]
    fn test_apply_rejects_preview_after_root_edit() {
        let mut g = build(
            vec![task("A", 0, 5), task("B", 5, 10)],
            vec![Dependency::fs("A", "B")],
        );
        let preview = compute_cascade(&g, "A", 2, DateField::EndDate).unwrap();
        g.update_task_dates("A", day(0), Some(day(3))).unwrap();

        let err = CascadeEngine::new(&g)
            .apply("A", 2, DateField::EndDate, Some(&preview))
            .unwrap_err();
        assert!(matches!(err, CascadeError::StalePreview { task_id, .. } if task_id == "A"));
    }

    #[test]
    fn test_apply_rejects_preview_of_another_edit() {
        let g = build(
            vec![task("A", 0, 5), task("B", 5, 10)],
            vec![Dependency::fs("A", "B")],
        );
        let engine = CascadeEngine::new(&g);
        let preview = engine.preview("A", 2, DateField::EndDate).unwrap();

        for (id, shift, field) in [
            ("A", -1, DateField::StartDate),
            ("A", 3, DateField::EndDate),
            ("A", 2, DateField::StartDate),
            ("B", 2, DateField::EndDate),
        ] {
            let err = engine.apply(id, shift, field, Some(&preview)).unwrap_err();
            assert!(
                matches!(err, CascadeError::StalePreview { .. }),
                "{} {:+} {:?}",
                id,
                shift,
                field
            );
        }
    }

    #[test]
    fn test_apply_to_commits_root_and_changes() {
        let mut g = build(
            vec![task("A", 0, 5), task("B", 5, 10)],
            vec![Dependency::fs("A", "B")],
        );
        let outcome = compute_cascade(&g, "A", 2, DateField::EndDate).unwrap();
        outcome.apply_to(&mut g).unwrap();
        assert_eq!(g.task("A").unwrap().end_date, Some(day(7)));
        assert_eq!(g.task("B").unwrap().start_date, day(7));
        assert_eq!(g.task("B").unwrap().end_date, Some(day(12)));
    }
}
