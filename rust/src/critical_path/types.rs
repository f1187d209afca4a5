//! Types for critical path results.

use chrono::{Duration, NaiveDate};
use pyo3::prelude::*;
use rustc_hash::FxHashMap;
use std::collections::HashMap;

/// Per-task timing from the forward and backward passes.
///
/// Offsets are whole days relative to the result's origin (the earliest
/// start among the tasks considered).
#[pyclass]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskTiming {
    #[pyo3(get)]
    pub task_id: String,
    #[pyo3(get)]
    pub duration_days: i64,
    /// Earliest possible start (forward pass).
    #[pyo3(get)]
    pub earliest_start: i64,
    /// Earliest possible finish (forward pass).
    #[pyo3(get)]
    pub earliest_finish: i64,
    /// Latest allowable start (backward pass).
    #[pyo3(get)]
    pub latest_start: i64,
    /// Latest allowable finish (backward pass).
    #[pyo3(get)]
    pub latest_finish: i64,
    /// latest_start - earliest_start.
    #[pyo3(get)]
    pub float_days: i64,
    pub(crate) origin: NaiveDate,
}

impl TaskTiming {
    pub fn is_critical(&self) -> bool {
        self.float_days <= 0
    }

    fn date(&self, offset: i64) -> NaiveDate {
        self.origin + Duration::days(offset)
    }
}

#[pymethods]
impl TaskTiming {
    #[getter(is_critical)]
    fn py_is_critical(&self) -> bool {
        self.is_critical()
    }

    #[getter]
    pub fn earliest_start_date(&self) -> NaiveDate {
        self.date(self.earliest_start)
    }

    #[getter]
    pub fn earliest_finish_date(&self) -> NaiveDate {
        self.date(self.earliest_finish)
    }

    #[getter]
    pub fn latest_start_date(&self) -> NaiveDate {
        self.date(self.latest_start)
    }

    #[getter]
    pub fn latest_finish_date(&self) -> NaiveDate {
        self.date(self.latest_finish)
    }

    fn __repr__(&self) -> String {
        format!(
            "TaskTiming(task_id={:?}, es={}, ef={}, ls={}, lf={}, float={})",
            self.task_id,
            self.earliest_start,
            self.earliest_finish,
            self.latest_start,
            self.latest_finish,
            self.float_days
        )
    }
}

/// Result of a CPM run over one graph snapshot.
#[pyclass]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CriticalPathResult {
    /// Day zero of all offsets; `None` when no task was considered.
    #[pyo3(get)]
    pub origin: Option<NaiveDate>,
    /// Latest earliest-finish, in days from the origin.
    #[pyo3(get)]
    pub project_end: i64,
    /// Timings in topological order.
    #[pyo3(get)]
    pub task_timings: Vec<TaskTiming>,
    /// Tasks with float <= 0, in topological order.
    #[pyo3(get)]
    pub critical_tasks: Vec<String>,
    /// Project makespan in days.
    #[pyo3(get)]
    pub critical_path_length: i64,
    /// Sum of the durations of every task considered.
    #[pyo3(get)]
    pub total_work: i64,
}

impl CriticalPathResult {
    pub fn timing(&self, task_id: &str) -> Option<&TaskTiming> {
        self.task_timings.iter().find(|t| t.task_id == task_id)
    }

    pub fn is_critical(&self, task_id: &str) -> bool {
        self.timing(task_id).is_some_and(TaskTiming::is_critical)
    }

    pub fn task_floats(&self) -> FxHashMap<&str, i64> {
        self.task_timings
            .iter()
            .map(|t| (t.task_id.as_str(), t.float_days))
            .collect()
    }
}

#[pymethods]
impl CriticalPathResult {
    #[getter(task_floats)]
    fn py_task_floats(&self) -> HashMap<String, i64> {
        self.task_timings
            .iter()
            .map(|t| (t.task_id.clone(), t.float_days))
            .collect()
    }

    #[getter]
    pub fn project_end_date(&self) -> Option<NaiveDate> {
        self.origin.map(|o| o + Duration::days(self.project_end))
    }

    fn __repr__(&self) -> String {
        format!(
            "CriticalPathResult(critical_tasks={:?}, length={}, total_work={})",
            self.critical_tasks, self.critical_path_length, self.total_work
        )
    }
}
