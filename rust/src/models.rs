//! Core data types for the dependency scheduling engine.

use chrono::{Duration, NaiveDate};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error raised when a host label does not name a known variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unknown {kind}: {value:?}")]
    UnknownLabel { kind: &'static str, value: String },
}

impl From<ParseError> for PyErr {
    fn from(err: ParseError) -> Self {
        PyValueError::new_err(err.to_string())
    }
}

/// `date + days`, or `None` outside chrono's supported range.
pub(crate) fn offset_date(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    Duration::try_days(days).and_then(|d| date.checked_add_signed(d))
}

/// Lowercase and drop separators so "Finish to Start", "finish_to_start"
/// and "FinishToStart" all compare equal.
fn normalize_label(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// How a predecessor's dates constrain its successor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DependencyType {
    FinishToStart,
    StartToStart,
    FinishToFinish,
    StartToFinish,
}

impl DependencyType {
    pub fn short_code(self) -> &'static str {
        match self {
            Self::FinishToStart => "FS",
            Self::StartToStart => "SS",
            Self::FinishToFinish => "FF",
            Self::StartToFinish => "SF",
        }
    }

    /// Whether the anchor event on the predecessor side is its start.
    pub fn anchored_on_predecessor_start(self) -> bool {
        matches!(self, Self::StartToStart | Self::StartToFinish)
    }

    /// Whether the constrained event on the successor side is its finish.
    pub fn constrains_successor_finish(self) -> bool {
        matches!(self, Self::FinishToFinish | Self::StartToFinish)
    }
}

impl FromStr for DependencyType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_label(s).as_str() {
            "fs" | "finishtostart" => Ok(Self::FinishToStart),
            "ss" | "starttostart" => Ok(Self::StartToStart),
            "ff" | "finishtofinish" => Ok(Self::FinishToFinish),
            "sf" | "starttofinish" => Ok(Self::StartToFinish),
            _ => Err(ParseError::UnknownLabel {
                kind: "dependency type",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_code())
    }
}

/// Workflow status of a task.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    #[default]
    Open,
    InProgress,
    Review,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::InProgress => "In Progress",
            Self::Review => "Review",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Completed or Cancelled: no further work will happen on the task.
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl FromStr for TaskStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_label(s).as_str() {
            "open" => Ok(Self::Open),
            "inprogress" => Ok(Self::InProgress),
            "review" => Ok(Self::Review),
            "completed" => Ok(Self::Completed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            _ => Err(ParseError::UnknownLabel {
                kind: "task status",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Special node behaviors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SchedulingType {
    #[default]
    Normal,
    /// Span derived from the surrounding anchor tasks.
    Hammock,
    /// Fixed padding that absorbs upstream delay.
    Buffer,
}

impl SchedulingType {
    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Hammock => "Hammock",
            Self::Buffer => "Buffer",
        }
    }
}

impl FromStr for SchedulingType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_label(s).as_str() {
            "" | "normal" => Ok(Self::Normal),
            "hammock" => Ok(Self::Hammock),
            "buffer" => Ok(Self::Buffer),
            _ => Err(ParseError::UnknownLabel {
                kind: "scheduling type",
                value: s.to_string(),
            }),
        }
    }
}

/// Per-project reaction to date edits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DependencyMode {
    /// Cascades are previewed and wait for confirmation.
    #[default]
    Flexible,
    /// Cascades are committed immediately.
    Strict,
    /// Date edits never cascade.
    Off,
}

impl DependencyMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Flexible => "Flexible",
            Self::Strict => "Strict",
            Self::Off => "Off",
        }
    }
}

impl FromStr for DependencyMode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_label(s).as_str() {
            // Projects that never chose a mode behave as Flexible.
            "" | "flexible" => Ok(Self::Flexible),
            "strict" => Ok(Self::Strict),
            "off" => Ok(Self::Off),
            _ => Err(ParseError::UnknownLabel {
                kind: "dependency mode",
                value: s.to_string(),
            }),
        }
    }
}

/// Which date of a task was edited.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DateField {
    StartDate,
    EndDate,
}

impl DateField {
    pub fn label(self) -> &'static str {
        match self {
            Self::StartDate => "start_date",
            Self::EndDate => "end_date",
        }
    }
}

impl FromStr for DateField {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_label(s).as_str() {
            "startdate" | "start" => Ok(Self::StartDate),
            // The host stores the finish as `due_date`.
            "enddate" | "end" | "duedate" => Ok(Self::EndDate),
            _ => Err(ParseError::UnknownLabel {
                kind: "date field",
                value: s.to_string(),
            }),
        }
    }
}

/// A dependency edge between two tasks of the same project.
#[pyclass]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dependency {
    #[pyo3(get, set)]
    pub predecessor_id: String,
    #[pyo3(get, set)]
    pub successor_id: String,
    pub dependency_type: DependencyType,
    /// Positive = delay after the anchor event, negative = lead.
    #[pyo3(get, set)]
    pub lag_days: i64,
}

impl Dependency {
    pub fn new(
        predecessor_id: impl Into<String>,
        successor_id: impl Into<String>,
        dependency_type: DependencyType,
        lag_days: i64,
    ) -> Self {
        Self {
            predecessor_id: predecessor_id.into(),
            successor_id: successor_id.into(),
            dependency_type,
            lag_days,
        }
    }

    /// Finish-to-start edge without lag.
    pub fn fs(predecessor_id: impl Into<String>, successor_id: impl Into<String>) -> Self {
        Self::new(predecessor_id, successor_id, DependencyType::FinishToStart, 0)
    }
}

#[pymethods]
impl Dependency {
    #[new]
    #[pyo3(signature = (predecessor_id, successor_id, dependency_type="FS", lag_days=0))]
    fn py_new(
        predecessor_id: String,
        successor_id: String,
        dependency_type: &str,
        lag_days: i64,
    ) -> PyResult<Self> {
        Ok(Self::new(
            predecessor_id,
            successor_id,
            dependency_type.parse()?,
            lag_days,
        ))
    }

    #[getter(dependency_type)]
    fn py_dependency_type(&self) -> &'static str {
        self.dependency_type.short_code()
    }

    #[setter(dependency_type)]
    fn py_set_dependency_type(&mut self, value: &str) -> PyResult<()> {
        self.dependency_type = value.parse()?;
        Ok(())
    }

    fn __repr__(&self) -> String {
        format!(
            "Dependency({:?} -[{} {:+}]-> {:?})",
            self.predecessor_id, self.dependency_type, self.lag_days, self.successor_id
        )
    }
}

/// A task node as supplied by the host.
#[pyclass]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Task {
    #[pyo3(get, set)]
    pub id: String,
    #[pyo3(get, set)]
    pub project: String,
    #[pyo3(get, set)]
    pub start_date: NaiveDate,
    #[pyo3(get, set)]
    pub end_date: Option<NaiveDate>,
    pub status: TaskStatus,
    pub scheduling_type: SchedulingType,
    /// Only meaningful on Buffer nodes.
    #[pyo3(get, set)]
    pub buffer_consumed_days: Option<i64>,
    /// Named group this task belongs to within its project.
    #[pyo3(get, set)]
    pub task_group: Option<String>,
    /// Group that must be closed before this task is unblocked.
    #[pyo3(get, set)]
    pub depends_on_group: Option<String>,
}

impl Task {
    pub fn new(id: impl Into<String>, start_date: NaiveDate, end_date: Option<NaiveDate>) -> Self {
        Self {
            id: id.into(),
            project: String::new(),
            start_date,
            end_date,
            status: TaskStatus::default(),
            scheduling_type: SchedulingType::default(),
            buffer_consumed_days: None,
            task_group: None,
            depends_on_group: None,
        }
    }

    pub fn in_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_scheduling_type(mut self, scheduling_type: SchedulingType) -> Self {
        self.scheduling_type = scheduling_type;
        if scheduling_type == SchedulingType::Buffer && self.buffer_consumed_days.is_none() {
            self.buffer_consumed_days = Some(0);
        }
        self
    }

    pub fn with_buffer_consumed(mut self, days: i64) -> Self {
        self.buffer_consumed_days = Some(days);
        self
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.task_group = Some(group.into());
        self
    }

    pub fn after_group(mut self, group: impl Into<String>) -> Self {
        self.depends_on_group = Some(group.into());
        self
    }

    /// `end_date - start_date` in days, 0 for tasks without a finish.
    pub fn duration_days(&self) -> i64 {
        self.end_date
            .map(|end| (end - self.start_date).num_days())
            .unwrap_or(0)
    }

    /// The finish, or the start for tasks without one.
    pub fn finish_or_start(&self) -> NaiveDate {
        self.end_date.unwrap_or(self.start_date)
    }

    pub fn is_hammock(&self) -> bool {
        self.scheduling_type == SchedulingType::Hammock
    }

    pub fn is_buffer(&self) -> bool {
        self.scheduling_type == SchedulingType::Buffer
    }
}

#[pymethods]
impl Task {
    #[new]
    #[pyo3(signature = (
        id,
        start_date,
        end_date=None,
        project=String::new(),
        status="Open",
        scheduling_type="Normal",
        buffer_consumed_days=None,
        task_group=None,
        depends_on_group=None
    ))]
    #[allow(clippy::too_many_arguments)]
    fn py_new(
        id: String,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
        project: String,
        status: &str,
        scheduling_type: &str,
        buffer_consumed_days: Option<i64>,
        task_group: Option<String>,
        depends_on_group: Option<String>,
    ) -> PyResult<Self> {
        let mut task = Self::new(id, start_date, end_date)
            .in_project(project)
            .with_status(status.parse()?)
            .with_scheduling_type(scheduling_type.parse()?);
        if buffer_consumed_days.is_some() {
            task.buffer_consumed_days = buffer_consumed_days;
        }
        task.task_group = task_group;
        task.depends_on_group = depends_on_group;
        Ok(task)
    }

    #[getter(status)]
    fn py_status(&self) -> &'static str {
        self.status.label()
    }

    #[setter(status)]
    fn py_set_status(&mut self, value: &str) -> PyResult<()> {
        self.status = value.parse()?;
        Ok(())
    }

    #[getter(scheduling_type)]
    fn py_scheduling_type(&self) -> &'static str {
        self.scheduling_type.label()
    }

    #[setter(scheduling_type)]
    fn py_set_scheduling_type(&mut self, value: &str) -> PyResult<()> {
        self.scheduling_type = value.parse()?;
        Ok(())
    }

    #[getter(duration_days)]
    fn py_duration_days(&self) -> i64 {
        self.duration_days()
    }

    fn __repr__(&self) -> String {
        format!(
            "Task(id={:?}, start={}, end={:?}, status={}, type={})",
            self.id,
            self.start_date,
            self.end_date,
            self.status,
            self.scheduling_type.label()
        )
    }
}
