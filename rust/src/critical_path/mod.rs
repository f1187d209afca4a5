//! Critical Path Method over a schedule graph.
//!
//! Forward pass for earliest dates, backward pass from the project end for
//! latest dates; tasks with no float are critical.

mod calculation;
mod types;

pub use calculation::compute_critical_path;
pub use types::{CriticalPathResult, TaskTiming};
