//! Rust implementation of the Orga dependency scheduling engine.
//!
//! Graph model, cycle guard, date-cascade propagation, critical path and
//! the per-project scheduling policy. Every call works on a snapshot the
//! host passes in and returns results for the host to persist.

// Allow clippy warning triggered by PyO3 macro expansion
#![allow(clippy::useless_conversion)]

use chrono::NaiveDate;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

pub mod cascade;
mod config;
pub mod critical_path;
pub mod cycle;
pub mod graph;
mod interner;
pub mod logging;
mod models;
pub mod policy;

pub use cascade::{
    compute_cascade, BufferUpdate, CascadeChange, CascadeEngine, CascadeError, CascadeMode,
    CascadeOutcome,
};
pub use config::EngineConfig;
pub use critical_path::{compute_critical_path, CriticalPathResult, TaskTiming};
pub use cycle::{would_create_cycle, CycleCheck};
pub use graph::{GraphError, Link, ScheduleGraph};
pub use models::{
    DateField, Dependency, DependencyMode, DependencyType, ParseError, SchedulingType, Task,
    TaskStatus,
};
pub use policy::{
    blocked_state, blocked_states, buffer_status, hammock_span, BlockedState, BufferHealth,
    BufferStatus, PolicyDecision, ScheduleReaction, SchedulingPolicy,
};

fn value_error(err: impl std::fmt::Display) -> PyErr {
    PyValueError::new_err(err.to_string())
}

/// Build the snapshot for one call, scoped to `project` when given.
fn snapshot(
    project: Option<&str>,
    tasks: &[Task],
    dependencies: &[Dependency],
) -> PyResult<ScheduleGraph> {
    match project {
        Some(p) => ScheduleGraph::for_project(p, tasks, dependencies),
        None => ScheduleGraph::from_tasks(tasks, dependencies),
    }
    .map_err(value_error)
}

/// Check whether adding `predecessor_id -> successor_id` would create a cycle.
///
/// # Returns
/// * CycleCheck with the offending path and a user-facing message
///
/// # Raises
/// * ValueError if the existing edges are already invalid
#[pyfunction]
#[pyo3(signature = (tasks, dependencies, predecessor_id, successor_id, project=None))]
fn check_circular_dependency(
    tasks: Vec<Task>,
    dependencies: Vec<Dependency>,
    predecessor_id: &str,
    successor_id: &str,
    project: Option<&str>,
) -> PyResult<CycleCheck> {
    let graph = snapshot(project, &tasks, &dependencies)?;
    Ok(would_create_cycle(&graph, predecessor_id, successor_id))
}

/// Compute the cascade of a date edit without marking it for persistence.
///
/// # Arguments
/// * `changed_task_id` - Task whose date was edited
/// * `date_shift_days` - Signed shift in days
/// * `changed_field` - "start_date" or "end_date" (alias "due_date")
///
/// # Raises
/// * ValueError on unknown tasks, hammock edits or inconsistent dates
#[pyfunction]
#[pyo3(signature = (
    tasks,
    dependencies,
    changed_task_id,
    date_shift_days,
    changed_field="end_date",
    project=None,
    config=None
))]
fn preview_cascade(
    tasks: Vec<Task>,
    dependencies: Vec<Dependency>,
    changed_task_id: &str,
    date_shift_days: i64,
    changed_field: &str,
    project: Option<&str>,
    config: Option<EngineConfig>,
) -> PyResult<CascadeOutcome> {
    let config = config.unwrap_or_default();
    let graph = snapshot(project, &tasks, &dependencies)?;
    CascadeEngine::new(&graph)
        .with_verbosity(config.verbosity)
        .preview(changed_task_id, date_shift_days, changed_field.parse()?)
        .map_err(value_error)
}

/// Produce a cascade marked for persistence.
///
/// When `previous` is given it must still match the snapshot; otherwise
/// ValueError is raised and the host should preview again.
#[pyfunction]
#[pyo3(signature = (
    tasks,
    dependencies,
    changed_task_id,
    date_shift_days,
    changed_field="end_date",
    previous=None,
    project=None,
    config=None
))]
#[allow(clippy::too_many_arguments)]
fn apply_cascade(
    tasks: Vec<Task>,
    dependencies: Vec<Dependency>,
    changed_task_id: &str,
    date_shift_days: i64,
    changed_field: &str,
    previous: Option<CascadeOutcome>,
    project: Option<&str>,
    config: Option<EngineConfig>,
) -> PyResult<CascadeOutcome> {
    let config = config.unwrap_or_default();
    let graph = snapshot(project, &tasks, &dependencies)?;
    CascadeEngine::new(&graph)
        .with_verbosity(config.verbosity)
        .apply(
            changed_task_id,
            date_shift_days,
            changed_field.parse()?,
            previous.as_ref(),
        )
        .map_err(value_error)
}

/// Decide how a project reacts to a date edit under its dependency mode.
///
/// # Returns
/// * PolicyDecision: action "none", "confirm" (Flexible) or "commit" (Strict)
#[pyfunction]
#[pyo3(signature = (
    tasks,
    dependencies,
    task_id,
    changed_field,
    date_shift_days,
    mode="Flexible",
    project=None,
    config=None
))]
#[allow(clippy::too_many_arguments)]
fn handle_date_change(
    tasks: Vec<Task>,
    dependencies: Vec<Dependency>,
    task_id: &str,
    changed_field: &str,
    date_shift_days: i64,
    mode: &str,
    project: Option<&str>,
    config: Option<EngineConfig>,
) -> PyResult<PolicyDecision> {
    let graph = snapshot(project, &tasks, &dependencies)?;
    let policy = SchedulingPolicy::new(mode.parse()?, config.unwrap_or_default());
    policy
        .on_dates_changed(&graph, task_id, changed_field.parse()?, date_shift_days)
        .map(PolicyDecision::from)
        .map_err(value_error)
}

/// Decide how a project reacts to a status change (successor advancement).
///
/// The snapshot should already carry the task's final dates.
#[pyfunction]
#[pyo3(signature = (
    tasks,
    dependencies,
    task_id,
    old_status,
    new_status,
    mode="Flexible",
    project=None,
    config=None
))]
#[allow(clippy::too_many_arguments)]
fn handle_status_change(
    tasks: Vec<Task>,
    dependencies: Vec<Dependency>,
    task_id: &str,
    old_status: &str,
    new_status: &str,
    mode: &str,
    project: Option<&str>,
    config: Option<EngineConfig>,
) -> PyResult<PolicyDecision> {
    let graph = snapshot(project, &tasks, &dependencies)?;
    let policy = SchedulingPolicy::new(mode.parse()?, config.unwrap_or_default());
    policy
        .on_status_changed(&graph, task_id, old_status.parse()?, new_status.parse()?)
        .map(PolicyDecision::from)
        .map_err(value_error)
}

/// Run the Critical Path Method over the snapshot.
#[pyfunction]
#[pyo3(signature = (tasks, dependencies, project=None, config=None))]
fn calculate_critical_path(
    tasks: Vec<Task>,
    dependencies: Vec<Dependency>,
    project: Option<&str>,
    config: Option<EngineConfig>,
) -> PyResult<CriticalPathResult> {
    let graph = snapshot(project, &tasks, &dependencies)?;
    Ok(compute_critical_path(&graph, &config.unwrap_or_default()))
}

/// Blocked flag and blocking predecessors for every task.
#[pyfunction]
#[pyo3(signature = (tasks, dependencies, project=None))]
fn compute_blocked_states(
    tasks: Vec<Task>,
    dependencies: Vec<Dependency>,
    project: Option<&str>,
) -> PyResult<Vec<BlockedState>> {
    let graph = snapshot(project, &tasks, &dependencies)?;
    Ok(blocked_states(&graph))
}

/// Recompute a hammock's `(start_date, end_date)`; None for other tasks.
#[pyfunction]
#[pyo3(signature = (tasks, dependencies, task_id, project=None))]
fn recalculate_hammock(
    tasks: Vec<Task>,
    dependencies: Vec<Dependency>,
    task_id: &str,
    project: Option<&str>,
) -> PyResult<Option<(NaiveDate, NaiveDate)>> {
    let graph = snapshot(project, &tasks, &dependencies)?;
    hammock_span(&graph, task_id).map_err(value_error)
}

/// Consumption report for a buffer task; None for other tasks.
///
/// # Raises
/// * ValueError if the consumed days do not fit the buffer
#[pyfunction]
#[pyo3(signature = (task, config=None))]
fn buffer_health(task: Task, config: Option<EngineConfig>) -> PyResult<Option<BufferStatus>> {
    graph::check_task(&task).map_err(value_error)?;
    Ok(buffer_status(&task, &config.unwrap_or_default()))
}

/// The orga.rust Python module.
#[pymodule]
fn rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Core data types
    m.add_class::<Dependency>()?;
    m.add_class::<Task>()?;

    // Config types
    m.add_class::<EngineConfig>()?;

    // Results
    m.add_class::<CycleCheck>()?;
    m.add_class::<CascadeChange>()?;
    m.add_class::<BufferUpdate>()?;
    m.add_class::<CascadeOutcome>()?;
    m.add_class::<PolicyDecision>()?;
    m.add_class::<TaskTiming>()?;
    m.add_class::<CriticalPathResult>()?;
    m.add_class::<BlockedState>()?;
    m.add_class::<BufferStatus>()?;

    // Algorithms
    m.add_function(wrap_pyfunction!(check_circular_dependency, m)?)?;
    m.add_function(wrap_pyfunction!(preview_cascade, m)?)?;
    m.add_function(wrap_pyfunction!(apply_cascade, m)?)?;
    m.add_function(wrap_pyfunction!(handle_date_change, m)?)?;
    m.add_function(wrap_pyfunction!(handle_status_change, m)?)?;
    m.add_function(wrap_pyfunction!(calculate_critical_path, m)?)?;
    m.add_function(wrap_pyfunction!(compute_blocked_states, m)?)?;
    m.add_function(wrap_pyfunction!(recalculate_hammock, m)?)?;
    m.add_function(wrap_pyfunction!(buffer_health, m)?)?;

    Ok(())
}
