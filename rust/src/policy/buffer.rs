//! Buffer nodes: fixed schedule padding with tracked consumption.

use pyo3::prelude::*;

use crate::config::EngineConfig;
use crate::models::Task;

/// Traffic-light classification of a buffer's consumption.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferHealth {
    Healthy,
    Warning,
    Critical,
}

impl BufferHealth {
    pub fn label(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }

    pub fn from_ratio(ratio: f64, config: &EngineConfig) -> Self {
        if ratio >= config.buffer_critical_ratio {
            Self::Critical
        } else if ratio >= config.buffer_warning_ratio {
            Self::Warning
        } else {
            Self::Healthy
        }
    }
}

/// Consumption report for one buffer task.
#[pyclass]
#[derive(Clone, Debug, PartialEq)]
pub struct BufferStatus {
    #[pyo3(get)]
    pub task_id: String,
    #[pyo3(get)]
    pub size_days: i64,
    #[pyo3(get)]
    pub consumed_days: i64,
    #[pyo3(get)]
    pub remaining_days: i64,
    /// consumed / size, in [0, 1].
    #[pyo3(get)]
    pub ratio: f64,
    pub health: BufferHealth,
}

#[pymethods]
impl BufferStatus {
    #[getter(health)]
    fn py_health(&self) -> &'static str {
        self.health.label()
    }

    fn __repr__(&self) -> String {
        format!(
            "BufferStatus(task_id={:?}, consumed={}/{}, health={})",
            self.task_id,
            self.consumed_days,
            self.size_days,
            self.health.label()
        )
    }
}

/// Consumption ratio and health for a buffer task; `None` for other tasks.
///
/// Consumption is taken as-is; graph construction rejects values outside
/// `0..=duration_days`.
pub fn buffer_status(task: &Task, config: &EngineConfig) -> Option<BufferStatus> {
    if !task.is_buffer() {
        return None;
    }
    let size_days = task.duration_days();
    let consumed_days = task.buffer_consumed_days.unwrap_or(0);
    let ratio = if size_days > 0 {
        consumed_days as f64 / size_days as f64
    } else {
        0.0
    };
    Some(BufferStatus {
        task_id: task.id.clone(),
        size_days,
        consumed_days,
        remaining_days: size_days - consumed_days,
        ratio,
        health: BufferHealth::from_ratio(ratio, config),
    })
}

/// Split an incoming delay between the buffer and whatever lies past it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Absorption {
    pub absorbed: i64,
    pub consumed_after: i64,
    pub residual: i64,
}

/// Only delays are absorbed; pulls pass through and consumption never drops.
pub(crate) fn absorb(size_days: i64, consumed_days: i64, incoming: i64) -> Absorption {
    let consumed = consumed_days.max(0);
    if incoming <= 0 {
        return Absorption {
            absorbed: 0,
            consumed_after: consumed,
            residual: incoming,
        };
    }
    let remaining = (size_days - consumed).max(0);
    let absorbed = incoming.min(remaining);
    Absorption {
        absorbed,
        consumed_after: consumed + absorbed,
        residual: incoming - absorbed,
    }
}
