//! Scheduling primitives for the resumable interpreter.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum InterpreterState {
    NotStarted,
    Running,
    /// The step budget ran out; `run` may be called again.
    Paused,
    Completed,
    /// Cancelled through the [`CancellationToken`].
    Stopped,
    Error,
}

impl InterpreterState {
    /// No further operators will be executed.
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Stopped | Self::Error)
    }
}

/// Shared cancellation flag, checked before every operator.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// How much work a single `run` call may do before pausing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepBudget {
    /// Execute at most this many operators.
    Operators(usize),
    /// Stop at the first operator boundary after this much wall time.
    Duration(Duration),
    #[default]
    Unbounded,
}
