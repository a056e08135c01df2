//! Worker-facing handle to the running task.

use std::sync::Arc;

use crate::domain::{TaskFailure, TaskId};
use crate::error::WardenError;
use crate::task::Task;

/// Handed to [`Work::run`](super::Work::run). Everything a unit of work may
/// do to its own task goes through here.
#[derive(Clone)]
pub struct WorkContext {
    task: Arc<Task>,
}

impl WorkContext {
    pub(crate) fn new(task: Arc<Task>) -> Self {
        Self { task }
    }

    pub fn task_id(&self) -> TaskId {
        self.task.id()
    }

    pub fn is_cancellation_requested(&self) -> bool {
        self.task.is_cancellation_requested()
    }

    /// Completes once cancellation is requested. Meant for `tokio::select!`.
    pub async fn cancelled(&self) {
        self.task.cancellation_token().cancelled().await
    }

    /// `Err(TaskFailure::cancelled())` once cancellation is requested, so a
    /// work can leave with `?` at a check point.
    pub fn check_cancelled(&self) -> Result<(), TaskFailure> {
        if self.is_cancellation_requested() {
            Err(TaskFailure::cancelled())
        } else {
            Ok(())
        }
    }

    pub fn report_progress(&self, progress: i32) -> Result<(), WardenError> {
        self.task.set_progress(progress)
    }

    /// Rounds up to the next whole percent.
    pub fn report_progress_fraction(&self, progress: f64) -> Result<(), WardenError> {
        self.task.set_progress_fraction(progress)
    }

    pub fn report_work_detail(&self, detail: impl Into<String>) {
        self.task.set_work_detail(detail);
    }

    pub fn report_failure(&self, failure: impl Into<TaskFailure>) {
        self.task.capture_failure(failure.into());
    }

    /// Volunteer to be replaced by a fresh copy rather than be treated as
    /// finished. No-op if a disposition is already set.
    pub fn mark_restartable(&self) {
        self.task.mark_restartable();
    }
}
