use thiserror::Error;

use crate::domain::TaskId;

#[derive(Debug, Error)]
pub enum WardenError {
    #[error("progress must be within 0..=100, got {value}")]
    ProgressOutOfRange { value: i64 },

    #[error("task {0} has already been started")]
    AlreadyStarted(TaskId),

    #[error("cannot construct work of kind={kind}: {message}")]
    WorkConstruction { kind: String, message: String },

    #[error("task registry was modified concurrently")]
    ConcurrentModification,

    #[error("config: {0}")]
    Config(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}
