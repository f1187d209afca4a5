//! Per-project reaction to date edits and status changes.

use pyo3::prelude::*;

use crate::cascade::{CascadeEngine, CascadeError, CascadeOutcome, Seed};
use crate::config::EngineConfig;
use crate::graph::{GraphError, ScheduleGraph};
use crate::interner::TaskKey;
use crate::models::{offset_date, DateField, DependencyMode, DependencyType, TaskStatus};
use crate::policy::blocked::waits_on_others;
use crate::{log_changes, log_checks};

/// What the host should do after an edit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScheduleReaction {
    /// Nothing beyond the edit itself.
    NoCascade,
    /// Show the preview and persist only once the user confirms.
    AwaitingConfirmation(CascadeOutcome),
    /// Persist immediately, in the same transaction as the edit.
    Commit(CascadeOutcome),
}

impl ScheduleReaction {
    pub fn outcome(&self) -> Option<&CascadeOutcome> {
        match self {
            Self::NoCascade => None,
            Self::AwaitingConfirmation(outcome) | Self::Commit(outcome) => Some(outcome),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::NoCascade => "none",
            Self::AwaitingConfirmation(_) => "confirm",
            Self::Commit(_) => "commit",
        }
    }
}

/// Python view of a [`ScheduleReaction`].
#[pyclass]
#[derive(Clone, Debug)]
pub struct PolicyDecision {
    /// "none", "confirm" or "commit".
    #[pyo3(get)]
    pub action: String,
    #[pyo3(get)]
    pub outcome: Option<CascadeOutcome>,
}

#[pymethods]
impl PolicyDecision {
    #[getter]
    fn requires_confirmation(&self) -> bool {
        self.action == "confirm"
    }

    fn __repr__(&self) -> String {
        format!(
            "PolicyDecision(action={:?}, affected={})",
            self.action,
            self.outcome.as_ref().map_or(0, |o| o.total_affected)
        )
    }
}

impl From<ScheduleReaction> for PolicyDecision {
    fn from(reaction: ScheduleReaction) -> Self {
        let action = reaction.label().to_string();
        let outcome = match reaction {
            ScheduleReaction::NoCascade => None,
            ScheduleReaction::AwaitingConfirmation(o) | ScheduleReaction::Commit(o) => Some(o),
        };
        Self { action, outcome }
    }
}

/// A project's dependency mode plus engine settings.
#[derive(Clone, Debug, Default)]
pub struct SchedulingPolicy {
    pub mode: DependencyMode,
    pub config: EngineConfig,
}

impl SchedulingPolicy {
    pub fn new(mode: DependencyMode, config: EngineConfig) -> Self {
        Self { mode, config }
    }

    fn engine<'a>(&self, graph: &'a ScheduleGraph) -> CascadeEngine<'a> {
        CascadeEngine::new(graph).with_verbosity(self.config.verbosity)
    }

    /// Decide the reaction to shifting one date of `task_id`.
    ///
    /// Hammocks are rejected in every mode. An edit whose cascade moves
    /// nothing needs no confirmation and yields `NoCascade`.
    pub fn on_dates_changed(
        &self,
        graph: &ScheduleGraph,
        task_id: &str,
        field: DateField,
        date_shift_days: i64,
    ) -> Result<ScheduleReaction, CascadeError> {
        let task = graph
            .task(task_id)
            .ok_or_else(|| GraphError::UnknownTask(task_id.to_string()))?;
        if task.is_hammock() {
            return Err(CascadeError::HammockLocked(task_id.to_string()));
        }

        let engine = self.engine(graph);
        let reaction = match self.mode {
            DependencyMode::Off => ScheduleReaction::NoCascade,
            DependencyMode::Flexible => {
                let outcome = engine.preview(task_id, date_shift_days, field)?;
                if outcome.is_empty() {
                    ScheduleReaction::NoCascade
                } else {
                    ScheduleReaction::AwaitingConfirmation(outcome)
                }
            }
            DependencyMode::Strict => {
                let outcome = engine.apply(task_id, date_shift_days, field, None)?;
                if outcome.is_empty() {
                    ScheduleReaction::NoCascade
                } else {
                    ScheduleReaction::Commit(outcome)
                }
            }
        };

        log_changes!(
            self.config.verbosity,
            "{} mode: {} edit on {} -> {}",
            self.mode.label(),
            field.label(),
            task_id,
            reaction.label()
        );
        Ok(reaction)
    }

    /// Decide the reaction to a status transition.
    ///
    /// Only a transition into Completed does anything: each FS successor
    /// starting before `finish + lag` of the completed task is advanced to
    /// it, unless it still waits on another FS predecessor that is not
    /// Completed. The moves are cascaded together so fan-in keeps the
    /// largest shift. In Off mode this still commits unless
    /// `advance_successors_when_off` is cleared.
    pub fn on_status_changed(
        &self,
        graph: &ScheduleGraph,
        task_id: &str,
        old_status: TaskStatus,
        new_status: TaskStatus,
    ) -> Result<ScheduleReaction, CascadeError> {
        let key = graph
            .key(task_id)
            .ok_or_else(|| GraphError::UnknownTask(task_id.to_string()))?;

        if new_status != TaskStatus::Completed || old_status == TaskStatus::Completed {
            return Ok(ScheduleReaction::NoCascade);
        }
        if self.mode == DependencyMode::Off && !self.config.advance_successors_when_off {
            log_checks!(
                self.config.verbosity,
                "Off mode: successor advancement disabled for {}",
                task_id
            );
            return Ok(ScheduleReaction::NoCascade);
        }

        let seeds = self.completion_seeds(graph, key)?;
        if seeds.is_empty() {
            return Ok(ScheduleReaction::NoCascade);
        }

        let outcome = self.engine(graph).advance(task_id, &seeds)?;
        if outcome.is_empty() {
            return Ok(ScheduleReaction::NoCascade);
        }
        Ok(match self.mode {
            DependencyMode::Flexible => ScheduleReaction::AwaitingConfirmation(outcome),
            DependencyMode::Strict | DependencyMode::Off => {
                ScheduleReaction::Commit(outcome.into_apply())
            }
        })
    }

    fn completion_seeds(
        &self,
        graph: &ScheduleGraph,
        key: TaskKey,
    ) -> Result<Vec<Seed>, CascadeError> {
        let finish = graph.node(key).finish_or_start();
        let mut seeds = Vec::new();
        for e in graph.successor_edges(key) {
            if e.dependency_type != DependencyType::FinishToStart {
                continue;
            }
            let succ = graph.node(e.other);
            if succ.is_hammock() {
                continue;
            }
            if self.config.skip_closed_successors && succ.status.is_closed() {
                log_checks!(
                    self.config.verbosity,
                    "  skipping closed successor {}",
                    succ.id
                );
                continue;
            }
            if waits_on_others(graph, e.other, key) {
                log_checks!(
                    self.config.verbosity,
                    "  {} still waits on other predecessors",
                    succ.id
                );
                continue;
            }
            let ready =
                offset_date(finish, e.lag_days).ok_or_else(|| GraphError::DateOutOfRange {
                    task_id: succ.id.clone(),
                    days: e.lag_days,
                })?;
            let shift = (succ.start_date.max(ready) - succ.start_date).num_days();
            if shift > 0 {
                seeds.push(Seed {
                    key: e.other,
                    shift,
                });
            }
        }
        Ok(seeds)
    }
}
