//! Critical path calculation using forward and backward passes.

use chrono::NaiveDate;

use crate::config::EngineConfig;
use crate::graph::ScheduleGraph;
use crate::interner::TaskKey;
use crate::log_debug;
use crate::models::DependencyType;

use super::types::{CriticalPathResult, TaskTiming};

/// Earliest start a successor may take through one edge.
fn forward_bound(
    dependency_type: DependencyType,
    lag: i64,
    pred_es: i64,
    pred_ef: i64,
    succ_duration: i64,
) -> i64 {
    match dependency_type {
        DependencyType::FinishToStart => pred_ef + lag,
        DependencyType::StartToStart => pred_es + lag,
        DependencyType::FinishToFinish => pred_ef + lag - succ_duration,
        DependencyType::StartToFinish => pred_es + lag - succ_duration,
    }
}

/// Latest finish a predecessor may take through one edge.
fn backward_bound(
    dependency_type: DependencyType,
    lag: i64,
    succ_ls: i64,
    succ_lf: i64,
    pred_duration: i64,
) -> i64 {
    match dependency_type {
        DependencyType::FinishToStart => succ_ls - lag,
        DependencyType::StartToStart => succ_ls - lag + pred_duration,
        DependencyType::FinishToFinish => succ_lf - lag,
        DependencyType::StartToFinish => succ_lf - lag + pred_duration,
    }
}

/// Run CPM over the whole graph.
///
/// Sources start at their own start date; every other task starts as early
/// as its incoming edges allow. The backward pass is anchored at the latest
/// earliest-finish, so an isolated task's float is the distance from its
/// finish to the project end. Read-only: task dates are never touched.
pub fn compute_critical_path(graph: &ScheduleGraph, config: &EngineConfig) -> CriticalPathResult {
    let verbosity = config.verbosity;
    let included: Vec<bool> = graph
        .tasks()
        .map(|t| !(config.exclude_closed_from_critical_path && t.status.is_closed()))
        .collect();

    let topo_order: Vec<TaskKey> = graph
        .order_keys()
        .iter()
        .copied()
        .filter(|&k| included[k as usize])
        .collect();

    let Some(origin) = topo_order.iter().map(|&k| graph.node(k).start_date).min() else {
        return CriticalPathResult::default();
    };

    let n = graph.len();
    let durations: Vec<i64> = graph.tasks().map(|t| t.duration_days()).collect();
    let offset = |date: NaiveDate| (date - origin).num_days();

    // Forward pass
    let mut es = vec![0i64; n];
    let mut ef = vec![0i64; n];
    let mut total_work = 0;

    for &key in &topo_order {
        let idx = key as usize;
        let duration = durations[idx];
        total_work += duration;

        let earliest_start = graph
            .predecessor_edges(key)
            .iter()
            .filter(|e| included[e.other as usize])
            .map(|e| {
                let p = e.other as usize;
                forward_bound(e.dependency_type, e.lag_days, es[p], ef[p], duration)
            })
            .max()
            .unwrap_or_else(|| offset(graph.node(key).start_date));

        es[idx] = earliest_start;
        ef[idx] = earliest_start + duration;
        log_debug!(
            verbosity,
            "CPM forward {}: es={} ef={}",
            graph.id(key),
            es[idx],
            ef[idx]
        );
    }

    let project_end = topo_order
        .iter()
        .map(|&k| ef[k as usize])
        .max()
        .unwrap_or(0);

    // Backward pass
    let mut ls = vec![0i64; n];
    let mut lf = vec![0i64; n];

    for &key in topo_order.iter().rev() {
        let idx = key as usize;
        let duration = durations[idx];

        let latest_finish = graph
            .successor_edges(key)
            .iter()
            .filter(|e| included[e.other as usize])
            .map(|e| {
                let s = e.other as usize;
                backward_bound(e.dependency_type, e.lag_days, ls[s], lf[s], duration)
            })
            .min()
            .map_or(project_end, |bound| bound.min(project_end));

        lf[idx] = latest_finish;
        ls[idx] = latest_finish - duration;
        log_debug!(
            verbosity,
            "CPM backward {}: ls={} lf={}",
            graph.id(key),
            ls[idx],
            lf[idx]
        );
    }

    let mut task_timings = Vec::with_capacity(topo_order.len());
    let mut critical_tasks = Vec::new();

    for &key in &topo_order {
        let idx = key as usize;
        let timing = TaskTiming {
            task_id: graph.id(key).to_string(),
            duration_days: durations[idx],
            earliest_start: es[idx],
            earliest_finish: ef[idx],
            latest_start: ls[idx],
            latest_finish: lf[idx],
            float_days: ls[idx] - es[idx],
            origin,
        };
        if timing.is_critical() {
            critical_tasks.push(timing.task_id.clone());
        }
        task_timings.push(timing);
    }

    log_debug!(
        verbosity,
        "CPM: {} tasks, {} critical, project end day {}",
        task_timings.len(),
        critical_tasks.len(),
        project_end
    );

    CriticalPathResult {
        origin: Some(origin),
        project_end,
        task_timings,
        critical_tasks,
        critical_path_length: project_end,
        total_work,
    }
}
