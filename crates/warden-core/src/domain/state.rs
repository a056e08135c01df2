//! Task state: the raw execution phase and the derived, operator-facing state.

use serde::{Deserialize, Serialize};

use super::Behaviour;

/// Raw phase of the unit of execution behind a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPhase {
    /// Not yet admitted to run.
    NotStarted,

    /// Running, no cancellation requested.
    Running,

    /// Running, cancellation requested but not yet observed by the work.
    InterruptionRequested,

    /// The unit of work has exited.
    Terminated,
}

/// Derived task state. Computed on demand, never stored.
///
/// State transitions:
/// - New -> Working -> Finished
/// - New -> Working -> Crashed
/// - New -> Working -> Stopping -> Finished | Stopped | Crashed
///
/// A stopped task is replaced by a new one by the housekeeper, so `Stopped`
/// never leads anywhere by itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    New,
    Working,
    Stopping,
    Stopped,
    Finished,
    Crashed,
}

impl TaskState {
    /// Derive the state from the execution phase, the disposition and the
    /// presence of a captured failure.
    ///
    /// A terminated task is `Crashed` whenever a failure was captured,
    /// regardless of its disposition.
    pub fn derive(
        phase: ExecutionPhase,
        disposition: Option<Behaviour>,
        has_failure: bool,
    ) -> Self {
        match phase {
            ExecutionPhase::NotStarted => TaskState::New,
            ExecutionPhase::Running => TaskState::Working,
            ExecutionPhase::InterruptionRequested => TaskState::Stopping,
            ExecutionPhase::Terminated => {
                if has_failure {
                    TaskState::Crashed
                } else if disposition == Some(Behaviour::PrepareForRestart) {
                    TaskState::Stopped
                } else {
                    TaskState::Finished
                }
            }
        }
    }

    /// Has the unit of work exited?
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Stopped | TaskState::Finished | TaskState::Crashed
        )
    }

    /// Does this task occupy a concurrency slot?
    pub fn occupies_slot(self) -> bool {
        matches!(self, TaskState::Working | TaskState::Stopping)
    }

    /// Untranslated label, used as the lookup key for display strings.
    pub fn label(self) -> &'static str {
        match self {
            TaskState::New => "new",
            TaskState::Working => "working",
            TaskState::Stopping => "stopping",
            TaskState::Stopped => "stopped",
            TaskState::Finished => "finished",
            TaskState::Crashed => "crashed",
        }
    }
}
