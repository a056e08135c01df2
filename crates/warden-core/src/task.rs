//! Task: one unit of cancellable background work with observable progress.
//!
//! Design:
//! - Identity is the `TaskId`; everything else is mutable runtime state.
//! - Fields are written from at least two contexts at once (the running work
//!   and an operator cancel), so each is guarded on its own.
//! - The configuration (`WorkFactory`) is kept apart from the runtime state;
//!   a restart builds a new Task from it.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::domain::{Behaviour, ExecutionPhase, TaskFailure, TaskId, TaskState};
use crate::error::WardenError;
use crate::ports::LabelProvider;
use crate::work::{Work, WorkContext, WorkFactory};

/// Phase of the underlying tokio task. Interruption is tracked by the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunPhase {
    NotStarted,
    Running,
    Terminated,
}

#[derive(Debug, Default)]
struct Fields {
    detail: Option<String>,
    failure: Option<TaskFailure>,
    disposition: Option<Behaviour>,
    time_of_death: Option<DateTime<Utc>>,
}

pub struct Task {
    id: TaskId,
    factory: Arc<dyn WorkFactory>,
    name_detail: Option<String>,

    /// Taken exactly once, by `start`.
    work: Mutex<Option<Box<dyn Work>>>,

    phase: watch::Sender<RunPhase>,
    cancel: CancellationToken,
    progress: AtomicU8,
    fields: Mutex<Fields>,
}

impl Task {
    /// Create a new, not-yet-started task from its configuration.
    pub fn new(factory: Arc<dyn WorkFactory>) -> Result<Arc<Self>, WardenError> {
        Self::build(factory, None)
    }

    /// Like [`Task::new`], with a detail appended to the display name (for
    /// example the title of the entity the task is about).
    pub fn with_name_detail(
        factory: Arc<dyn WorkFactory>,
        name_detail: impl Into<String>,
    ) -> Result<Arc<Self>, WardenError> {
        Self::build(factory, Some(name_detail.into()))
    }

    fn build(
        factory: Arc<dyn WorkFactory>,
        name_detail: Option<String>,
    ) -> Result<Arc<Self>, WardenError> {
        let work = factory.build()?;
        Ok(Arc::new(Self {
            id: TaskId::generate(),
            factory,
            name_detail,
            work: Mutex::new(Some(work)),
            phase: watch::Sender::new(RunPhase::NotStarted),
            cancel: CancellationToken::new(),
            progress: AtomicU8::new(0),
            fields: Mutex::new(Fields::default()),
        }))
    }

    /// A fresh, not-yet-started copy built from the same configuration:
    /// new identity, progress 0, no failure, no disposition, no time of death.
    pub fn clone_for_restart(&self) -> Result<Arc<Self>, WardenError> {
        Self::build(Arc::clone(&self.factory), self.name_detail.clone())
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn kind(&self) -> &str {
        self.factory.kind()
    }

    pub fn name_detail(&self) -> Option<&str> {
        self.name_detail.as_deref()
    }

    /// Translated kind, followed by `": <name detail>"` if there is one.
    pub fn display_name(&self, labels: &dyn LabelProvider) -> String {
        let title = labels.label(self.kind());
        match &self.name_detail {
            Some(detail) => format!("{title}: {detail}"),
            None => title,
        }
    }

    // ---- progress / detail ----

    pub fn progress(&self) -> u8 {
        self.progress.load(Ordering::Relaxed)
    }

    /// Fails with `ProgressOutOfRange` unless `0 <= progress <= 100`; the
    /// stored progress is left unchanged in that case.
    pub fn set_progress(&self, progress: i32) -> Result<(), WardenError> {
        let value = u8::try_from(progress)
            .ok()
            .filter(|p| *p <= 100)
            .ok_or(WardenError::ProgressOutOfRange {
                value: i64::from(progress),
            })?;
        self.progress.store(value, Ordering::Relaxed);
        Ok(())
    }

    /// Rounds up, then applies the same range rule as [`Task::set_progress`].
    pub fn set_progress_fraction(&self, progress: f64) -> Result<(), WardenError> {
        let rounded = progress.ceil();
        if !(0.0..=100.0).contains(&rounded) {
            return Err(WardenError::ProgressOutOfRange {
                value: rounded as i64,
            });
        }
        self.set_progress(rounded as i32)
    }

    pub fn work_detail(&self) -> Option<String> {
        self.fields().detail.clone()
    }

    pub fn set_work_detail(&self, detail: impl Into<String>) {
        self.fields().detail = Some(detail.into());
    }

    pub fn clear_work_detail(&self) {
        self.fields().detail = None;
    }

    // ---- failure ----

    pub fn failure(&self) -> Option<TaskFailure> {
        self.fields().failure.clone()
    }

    /// Record a failure. Only the first one is kept. The cancelled condition
    /// is discarded if cancellation had already been requested; in any case
    /// it re-raises the cancellation signal so it is not swallowed.
    pub fn capture_failure(&self, failure: TaskFailure) {
        let cancellation_requested = self.cancel.is_cancelled();
        if failure.is_cancellation() {
            self.cancel.cancel();
        }

        let mut fields = self.fields();
        if fields.failure.is_some() || (cancellation_requested && failure.is_cancellation()) {
            debug!(task = %self.id, %failure, "discarding failure");
            return;
        }
        error!(task = %self.id, %failure, "task failed");
        fields.failure = Some(failure);
    }

    /// The whole cause chain of the captured failure, if any.
    pub fn long_message(&self) -> Option<String> {
        self.fields().failure.as_ref().map(TaskFailure::long_message)
    }

    // ---- disposition / cancellation ----

    pub fn disposition(&self) -> Option<Behaviour> {
        self.fields().disposition
    }

    /// Set the disposition (unless already set) and signal the work to stop at
    /// its next check point. There is no preemption.
    pub fn request_cancellation(&self, disposition: Behaviour) {
        {
            let mut fields = self.fields();
            fields.disposition.get_or_insert(disposition);
        }
        info!(task = %self.id, ?disposition, "cancellation requested");
        self.cancel.cancel();
    }

    /// Called by the work itself to be replaced by a fresh copy rather than
    /// end up finished. No-op if a disposition is already set.
    pub fn mark_restartable(&self) {
        self.fields()
            .disposition
            .get_or_insert(Behaviour::PrepareForRestart);
    }

    pub fn is_cancellation_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Apply the default disposition if none is set and return the effective one.
    pub(crate) fn settle_disposition(&self) -> Behaviour {
        *self.fields().disposition.get_or_insert(Behaviour::default())
    }

    pub(crate) fn force_disposition(&self, disposition: Behaviour) {
        self.fields().disposition = Some(disposition);
    }

    // ---- time of death ----

    pub fn time_of_death(&self) -> Option<DateTime<Utc>> {
        self.fields().time_of_death
    }

    /// Set once; later calls keep the first timestamp.
    pub fn mark_time_of_death(&self, now: DateTime<Utc>) {
        self.fields().time_of_death.get_or_insert(now);
    }

    // ---- state ----

    pub fn execution_phase(&self) -> ExecutionPhase {
        match *self.phase.borrow() {
            RunPhase::NotStarted => ExecutionPhase::NotStarted,
            RunPhase::Terminated => ExecutionPhase::Terminated,
            RunPhase::Running if self.cancel.is_cancelled() => {
                ExecutionPhase::InterruptionRequested
            }
            RunPhase::Running => ExecutionPhase::Running,
        }
    }

    pub fn state(&self) -> TaskState {
        let phase = self.execution_phase();
        let fields = self.fields();
        TaskState::derive(phase, fields.disposition, fields.failure.is_some())
    }

    /// Translated state label, with the work detail while working or the
    /// root cause of the failure once crashed.
    pub fn status_line(&self, labels: &dyn LabelProvider) -> String {
        let state = self.state();
        let label = labels.label(state.label());
        let fields = self.fields();
        match (state, &fields.detail, &fields.failure) {
            (TaskState::Working, Some(detail), _) => format!("{label} ({detail})"),
            (TaskState::Crashed, Some(detail), Some(failure)) => {
                format!("{label} ({detail}: {failure})")
            }
            (TaskState::Crashed, None, Some(failure)) => format!("{label} ({failure})"),
            _ => label,
        }
    }

    /// Can a start button show? Only while not yet started.
    pub fn is_startable(&self) -> bool {
        self.execution_phase() == ExecutionPhase::NotStarted
    }

    /// Can a stop button show? Only while working.
    pub fn is_stoppable(&self) -> bool {
        self.state() == TaskState::Working
    }

    /// New or terminated, and not already bound for deletion.
    pub fn is_deletable(&self) -> bool {
        match self.execution_phase() {
            ExecutionPhase::NotStarted | ExecutionPhase::Terminated => {
                self.disposition() != Some(Behaviour::DeleteImmediately)
            }
            _ => false,
        }
    }

    // ---- execution ----

    /// Spawn the work on the current tokio runtime.
    ///
    /// The phase becomes `Running` before this returns, so the task occupies
    /// its concurrency slot at once.
    pub(crate) fn start(self: &Arc<Self>) -> Result<(), WardenError> {
        let work = lock(&self.work)
            .take()
            .ok_or(WardenError::AlreadyStarted(self.id))?;
        self.phase.send_replace(RunPhase::Running);

        let task = Arc::clone(self);
        tokio::spawn(async move { task.supervise(work).await });
        Ok(())
    }

    /// Take the work out so that the task can never start. Fails with
    /// `AlreadyStarted` if `start` got there first.
    pub(crate) fn retire(&self) -> Result<(), WardenError> {
        lock(&self.work)
            .take()
            .map(drop)
            .ok_or(WardenError::AlreadyStarted(self.id))
    }

    /// Runs the work in its own tokio task so a panic ends up as a captured
    /// failure instead of being lost.
    async fn supervise(self: Arc<Self>, work: Box<dyn Work>) {
        let ctx = WorkContext::new(Arc::clone(&self));
        let handle = tokio::spawn(async move { work.run(&ctx).await });

        let result = match handle.await {
            Ok(result) => result,
            Err(join_error) if join_error.is_panic() => {
                Err(TaskFailure::from_panic(join_error.into_panic()))
            }
            Err(_) => Err(TaskFailure::cancelled()),
        };
        if let Err(failure) = result {
            self.capture_failure(failure);
        }

        self.phase.send_replace(RunPhase::Terminated);
        debug!(task = %self.id, state = ?self.state(), "task terminated");
    }

    /// Wait until the work has exited. Returns at once for terminated tasks;
    /// never returns for tasks that are never started.
    pub async fn wait_terminated(&self) {
        let mut rx = self.phase.subscribe();
        let _ = rx.wait_for(|phase| *phase == RunPhase::Terminated).await;
    }

    fn fields(&self) -> MutexGuard<'_, Fields> {
        lock(&self.fields)
    }
}

// Each guarded field is written in a single assignment, so a poisoned lock
// still holds a consistent value.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("name_detail", &self.name_detail)
            .field("state", &self.state())
            .field("progress", &self.progress())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FailureKind;
    use crate::ports::PlainLabels;
    use crate::test_utils::{
        Brittle, Failing, Finishing, Panicking, RestartingItself, UntilCancelled, terminated,
    };
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    #[case(0)]
    #[case(42)]
    #[case(100)]
    fn set_progress_accepts_values_in_range(#[case] progress: i32) {
        let task = Task::new(Arc::new(Finishing)).unwrap();
        task.set_progress(progress).unwrap();
        assert_eq!(i32::from(task.progress()), progress);
    }

    #[rstest]
    #[case(-1)]
    #[case(101)]
    #[case(i32::MIN)]
    #[case(i32::MAX)]
    fn set_progress_rejects_values_out_of_range(#[case] progress: i32) {
        let task = Task::new(Arc::new(Finishing)).unwrap();
        task.set_progress(7).unwrap();

        let err = task.set_progress(progress).unwrap_err();
        assert!(matches!(
            err,
            WardenError::ProgressOutOfRange { value } if value == i64::from(progress)
        ));
        assert_eq!(task.progress(), 7);
    }

    #[test]
    fn fractional_progress_rounds_up() {
        let task = Task::new(Arc::new(Finishing)).unwrap();
        task.set_progress_fraction(41.2).unwrap();
        assert_eq!(task.progress(), 42);

        assert!(task.set_progress_fraction(100.01).is_err());
        assert!(task.set_progress_fraction(f64::NAN).is_err());
        assert_eq!(task.progress(), 42);
    }

    #[test]
    fn first_failure_wins() {
        let task = Task::new(Arc::new(Finishing)).unwrap();
        let a = TaskFailure::new("FirstError", "a");
        let b = TaskFailure::new("SecondError", "b");

        task.capture_failure(a.clone());
        task.capture_failure(b);

        assert_eq!(task.failure(), Some(a));
    }

    #[test]
    fn cancellation_is_not_a_failure_once_requested() {
        let task = Task::new(Arc::new(Finishing)).unwrap();
        task.request_cancellation(Behaviour::KeepForAWhile);
        task.capture_failure(TaskFailure::cancelled());
        assert!(task.failure().is_none());
    }

    #[test]
    fn unrequested_cancellation_is_recorded_and_reasserted() {
        let task = Task::new(Arc::new(Finishing)).unwrap();
        task.capture_failure(TaskFailure::cancelled());

        assert_eq!(
            task.failure().map(|f| f.kind()),
            Some(FailureKind::Cancelled)
        );
        assert!(task.is_cancellation_requested());
    }

    #[test]
    fn disposition_is_set_only_once() {
        let task = Task::new(Arc::new(Finishing)).unwrap();
        task.request_cancellation(Behaviour::DeleteImmediately);
        task.request_cancellation(Behaviour::PrepareForRestart);
        task.mark_restartable();
        assert_eq!(task.disposition(), Some(Behaviour::DeleteImmediately));
    }

    #[test]
    fn mark_restartable_sets_disposition_when_unset() {
        let task = Task::new(Arc::new(Finishing)).unwrap();
        task.mark_restartable();
        assert_eq!(task.disposition(), Some(Behaviour::PrepareForRestart));
        assert!(!task.is_cancellation_requested());
    }

    #[test]
    fn time_of_death_is_set_once() {
        let task = Task::new(Arc::new(Finishing)).unwrap();
        let first = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 1, 1, 13, 0, 0).unwrap();

        assert!(task.time_of_death().is_none());
        task.mark_time_of_death(first);
        task.mark_time_of_death(later);
        assert_eq!(task.time_of_death(), Some(first));
    }

    #[test]
    fn new_task_is_new_and_startable() {
        let task = Task::new(Arc::new(Finishing)).unwrap();
        assert_eq!(task.state(), TaskState::New);
        assert!(task.is_startable());
        assert!(!task.is_stoppable());
        assert!(task.is_deletable());
    }

    #[test]
    fn new_task_bound_for_deletion_is_not_deletable() {
        let task = Task::new(Arc::new(Finishing)).unwrap();
        task.request_cancellation(Behaviour::DeleteImmediately);
        assert!(!task.is_deletable());
    }

    #[test]
    fn display_name_appends_name_detail() {
        let plain = Task::new(Arc::new(Finishing)).unwrap();
        assert_eq!(plain.display_name(&PlainLabels), "finishing");

        let detailed = Task::with_name_detail(Arc::new(Finishing), "batch 7").unwrap();
        assert_eq!(detailed.display_name(&PlainLabels), "finishing: batch 7");
    }

    #[tokio::test]
    async fn working_then_stopping_then_finished() {
        let task = Task::new(Arc::new(UntilCancelled)).unwrap();
        task.start().unwrap();
        assert_eq!(task.state(), TaskState::Working);
        assert!(task.is_stoppable());
        assert!(!task.is_deletable());

        task.set_work_detail("page 3");
        assert_eq!(task.status_line(&PlainLabels), "working (page 3)");

        task.request_cancellation(Behaviour::KeepForAWhile);
        // The work may or may not have observed the signal yet.
        assert!(matches!(
            task.state(),
            TaskState::Stopping | TaskState::Finished
        ));

        task.wait_terminated().await;
        assert_eq!(task.state(), TaskState::Finished);
        assert!(task.failure().is_none());
    }

    #[tokio::test]
    async fn cancelled_with_restart_disposition_is_stopped() {
        let task = Task::new(Arc::new(UntilCancelled)).unwrap();
        task.start().unwrap();
        task.request_cancellation(Behaviour::PrepareForRestart);
        task.wait_terminated().await;
        assert_eq!(task.state(), TaskState::Stopped);
    }

    #[tokio::test]
    async fn work_may_volunteer_for_restart() {
        let task = terminated(Arc::new(RestartingItself)).await;
        assert_eq!(task.state(), TaskState::Stopped);
    }

    #[tokio::test]
    async fn failing_work_crashes_with_status_line() {
        let task = terminated(Arc::new(Failing)).await;
        assert_eq!(task.state(), TaskState::Crashed);
        assert_eq!(
            task.status_line(&PlainLabels),
            "crashed (TestError: intentional failure)"
        );
        assert!(task.long_message().is_some());
    }

    #[tokio::test]
    async fn panicking_work_is_captured() {
        let task = terminated(Arc::new(Panicking)).await;
        assert_eq!(task.state(), TaskState::Crashed);
        assert_eq!(
            task.failure().map(|f| f.kind()),
            Some(FailureKind::Panicked)
        );
    }

    #[tokio::test]
    async fn a_task_starts_only_once() {
        let task = Task::new(Arc::new(UntilCancelled)).unwrap();
        task.start().unwrap();
        let err = task.start().unwrap_err();
        assert!(matches!(err, WardenError::AlreadyStarted(id) if id == task.id()));
        task.request_cancellation(Behaviour::DeleteImmediately);
        task.wait_terminated().await;
    }

    #[test]
    fn retired_task_never_starts() {
        let task = Task::new(Arc::new(Finishing)).unwrap();
        task.retire().unwrap();

        let err = task.start().unwrap_err();
        assert!(matches!(err, WardenError::AlreadyStarted(id) if id == task.id()));
        assert!(task.retire().is_err());
        assert_eq!(task.state(), TaskState::New);
    }

    #[tokio::test]
    async fn started_task_cannot_be_retired() {
        let task = Task::new(Arc::new(UntilCancelled)).unwrap();
        task.start().unwrap();
        assert!(matches!(task.retire(), Err(WardenError::AlreadyStarted(_))));
        task.request_cancellation(Behaviour::DeleteImmediately);
        task.wait_terminated().await;
    }

    #[tokio::test]
    async fn restart_clone_is_fresh() {
        let task = terminated(Arc::new(Failing)).await;
        task.set_progress(55).unwrap();
        task.mark_time_of_death(Utc::now());

        let clone = task.clone_for_restart().unwrap();

        assert_ne!(clone.id(), task.id());
        assert_eq!(clone.kind(), task.kind());
        assert_eq!(clone.progress(), 0);
        assert!(clone.failure().is_none());
        assert!(clone.time_of_death().is_none());
        assert!(clone.disposition().is_none());
        assert_eq!(clone.state(), TaskState::New);
    }

    #[test]
    fn restart_clone_surfaces_construction_errors() {
        let task = Task::new(Arc::new(Brittle::new(1))).unwrap();
        let err = task.clone_for_restart().unwrap_err();
        assert!(matches!(err, WardenError::WorkConstruction { .. }));
    }
}
