//! Domain model (ids, disposition, state, failures).

pub mod behaviour;
pub mod failure;
pub mod ids;
pub mod state;

pub use behaviour::Behaviour;
pub use failure::{FailureKind, TaskFailure};
pub use ids::TaskId;
pub use state::{ExecutionPhase, TaskState};
