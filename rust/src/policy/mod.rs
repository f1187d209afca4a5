//! Scheduling policy layer.
//!
//! Maps a project's dependency mode onto cascade reactions, and holds the
//! special node behaviors: hammocks, buffers and blocked flagging.

pub mod blocked;
pub mod buffer;
mod core;
pub mod hammock;

pub use blocked::{blocked_state, blocked_states, BlockedState};
pub use buffer::{buffer_status, BufferHealth, BufferStatus};
pub use self::core::{PolicyDecision, ScheduleReaction, SchedulingPolicy};
pub use hammock::hammock_span;
