//! Configuration types for the scheduling engine.

use pyo3::prelude::*;

/// Engine-wide knobs. The dependency mode itself is not here: it is a
/// per-project value passed into every policy call.
#[pyclass]
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Verbosity level: 0=silent, 1=changes, 2=checks, 3=debug.
    #[pyo3(get, set)]
    pub verbosity: u8,
    /// Advance FS successors on completion even when the project mode is Off.
    #[pyo3(get, set)]
    pub advance_successors_when_off: bool,
    /// Leave Completed/Cancelled successors in place during completion advancement.
    #[pyo3(get, set)]
    pub skip_closed_successors: bool,
    /// Run CPM over open tasks only.
    #[pyo3(get, set)]
    pub exclude_closed_from_critical_path: bool,
    /// Consumption ratio at which a buffer turns from healthy to warning.
    #[pyo3(get, set)]
    pub buffer_warning_ratio: f64,
    /// Consumption ratio at which a buffer turns critical.
    #[pyo3(get, set)]
    pub buffer_critical_ratio: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            advance_successors_when_off: true,
            skip_closed_successors: true,
            exclude_closed_from_critical_path: false,
            buffer_warning_ratio: 0.5,
            buffer_critical_ratio: 0.9,
        }
    }
}

#[pymethods]
impl EngineConfig {
    #[new]
    #[pyo3(signature = (
        verbosity=None,
        advance_successors_when_off=None,
        skip_closed_successors=None,
        exclude_closed_from_critical_path=None,
        buffer_warning_ratio=None,
        buffer_critical_ratio=None
    ))]
    fn new(
        verbosity: Option<u8>,
        advance_successors_when_off: Option<bool>,
        skip_closed_successors: Option<bool>,
        exclude_closed_from_critical_path: Option<bool>,
        buffer_warning_ratio: Option<f64>,
        buffer_critical_ratio: Option<f64>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            verbosity: verbosity.unwrap_or(defaults.verbosity),
            advance_successors_when_off: advance_successors_when_off
                .unwrap_or(defaults.advance_successors_when_off),
            skip_closed_successors: skip_closed_successors
                .unwrap_or(defaults.skip_closed_successors),
            exclude_closed_from_critical_path: exclude_closed_from_critical_path
                .unwrap_or(defaults.exclude_closed_from_critical_path),
            buffer_warning_ratio: buffer_warning_ratio.unwrap_or(defaults.buffer_warning_ratio),
            buffer_critical_ratio: buffer_critical_ratio.unwrap_or(defaults.buffer_critical_ratio),
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "EngineConfig(verbosity={}, advance_successors_when_off={}, buffer_thresholds=({}, {}))",
            self.verbosity,
            self.advance_successors_when_off,
            self.buffer_warning_ratio,
            self.buffer_critical_ratio
        )
    }
}
