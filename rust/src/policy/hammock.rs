//! Hammock nodes: spans derived from the tasks around them.
//!
//! A hammock starts at the earliest finish among its FS predecessors and
//! ends at the latest start among its successors. Its dates are never
//! authored and never shifted; they are recomputed whenever an anchor moves.

use chrono::NaiveDate;

use crate::graph::{GraphError, ScheduleGraph};
use crate::interner::TaskKey;
use crate::models::{offset_date, DependencyType};

/// Derive a hammock's `(start, end)` from its anchors.
///
/// `dates` yields `(start, finish)` for any key, so the cascade engine can
/// pass dates that already include computed shifts. A side without anchors
/// keeps the hammock's current date on that side.
pub(crate) fn derive_span<F>(
    graph: &ScheduleGraph,
    key: TaskKey,
    dates: F,
) -> Result<(NaiveDate, NaiveDate), GraphError>
where
    F: Fn(TaskKey) -> (NaiveDate, NaiveDate),
{
    let node = graph.node(key);
    let out_of_range = |days| GraphError::DateOutOfRange {
        task_id: node.id.clone(),
        days,
    };

    let mut start: Option<NaiveDate> = None;
    for e in graph.predecessor_edges(key) {
        if e.dependency_type != DependencyType::FinishToStart {
            continue;
        }
        let anchor =
            offset_date(dates(e.other).1, e.lag_days).ok_or_else(|| out_of_range(e.lag_days))?;
        start = Some(start.map_or(anchor, |s| s.min(anchor)));
    }

    let mut end: Option<NaiveDate> = None;
    for e in graph.successor_edges(key) {
        let anchor = e
            .lag_days
            .checked_neg()
            .and_then(|back| offset_date(dates(e.other).0, back))
            .ok_or_else(|| out_of_range(e.lag_days))?;
        end = Some(end.map_or(anchor, |s| s.max(anchor)));
    }

    Ok((
        start.unwrap_or(node.start_date),
        end.unwrap_or_else(|| node.finish_or_start()),
    ))
}

/// Recompute one hammock against the graph's current dates.
///
/// Returns `Ok(None)` for tasks that are not hammocks, and an error when the
/// anchors have crossed so the span would end before it starts.
pub fn hammock_span(
    graph: &ScheduleGraph,
    id: &str,
) -> Result<Option<(NaiveDate, NaiveDate)>, GraphError> {
    let key = graph
        .key(id)
        .ok_or_else(|| GraphError::UnknownTask(id.to_string()))?;
    if !graph.node(key).is_hammock() {
        return Ok(None);
    }
    let (start, end) = derive_span(graph, key, |k| {
        let t = graph.node(k);
        (t.start_date, t.finish_or_start())
    })?;
    if end < start {
        return Err(GraphError::InconsistentDates {
            task_id: id.to_string(),
            start,
            end,
        });
    }
    Ok(Some((start, end)))
}
