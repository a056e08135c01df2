//! Task registry: the ordered, operator-visible list of all known tasks.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::domain::{TaskId, TaskState};
use crate::error::WardenError;
use crate::task::Task;

/// Direction for manual reprioritisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Towards the head: runs sooner.
    Earlier,
    /// Towards the tail: runs later.
    Later,
}

/// Structural changes computed from a snapshot, applied by [`TaskRegistry::commit`].
#[derive(Debug, Default)]
pub(crate) struct RegistryChanges {
    /// (replaced task, replacement), applied in place.
    pub replacements: Vec<(TaskId, Arc<Task>)>,
    pub removals: HashSet<TaskId>,
}

impl RegistryChanges {
    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty() && self.removals.is_empty()
    }
}

struct RegistryState {
    tasks: Vec<Arc<Task>>,

    /// Bumped on every structural mutation.
    generation: u64,
}

impl RegistryState {
    fn position(&self, id: TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| t.id() == id)
    }

    fn touch(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }
}

/// Ordered task list. Position is scheduling priority: earlier runs sooner.
/// Tasks are unique by id.
///
/// Design:
/// - Every structural mutation holds the single lock over the sequence.
/// - Readers get point-in-time copies, never the live `Vec`.
/// - The generation counter lets a caller compute changes from a snapshot
///   outside the lock and commit them only if nobody else touched the list.
pub struct TaskRegistry {
    state: Mutex<RegistryState>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState {
                tasks: Vec::new(),
                generation: 0,
            }),
        }
    }

    /// Add at the tail. Returns false if the task is already registered.
    pub async fn append(&self, task: Arc<Task>) -> bool {
        let mut state = self.state.lock().await;
        if state.position(task.id()).is_some() {
            return false;
        }
        state.tasks.push(task);
        state.touch();
        true
    }

    /// Insert right after the last `Working` task (at the head if none), so
    /// that running tasks are never pushed behind a task started by hand.
    /// Returns false if the task is already registered.
    pub async fn insert_after_last_running(&self, task: Arc<Task>) -> bool {
        let mut state = self.state.lock().await;
        if state.position(task.id()).is_some() {
            return false;
        }
        let index = state
            .tasks
            .iter()
            .rposition(|t| t.state() == TaskState::Working)
            .map_or(0, |i| i + 1);
        state.tasks.insert(index, task);
        state.touch();
        true
    }

    pub async fn remove(&self, id: TaskId) -> Option<Arc<Task>> {
        let mut state = self.state.lock().await;
        let index = state.position(id)?;
        let task = state.tasks.remove(index);
        state.touch();
        Some(task)
    }

    /// Swap a task with its neighbour. No-op (false) at the boundaries or if
    /// the task is unknown.
    pub async fn swap_adjacent(&self, id: TaskId, direction: Direction) -> bool {
        let mut state = self.state.lock().await;
        let Some(index) = state.position(id) else {
            return false;
        };
        let other = match direction {
            Direction::Earlier if index > 0 => index - 1,
            Direction::Later if index + 1 < state.tasks.len() => index + 1,
            _ => return false,
        };
        state.tasks.swap(index, other);
        state.touch();
        true
    }

    /// Immutable copy of the current order.
    pub async fn snapshot(&self) -> Vec<Arc<Task>> {
        self.state.lock().await.tasks.clone()
    }

    pub(crate) async fn snapshot_with_generation(&self) -> (Vec<Arc<Task>>, u64) {
        let state = self.state.lock().await;
        (state.tasks.clone(), state.generation)
    }

    /// Apply changes computed from the snapshot taken at `generation`.
    /// Fails with `ConcurrentModification` if the list changed since.
    pub(crate) async fn commit(
        &self,
        generation: u64,
        changes: &RegistryChanges,
    ) -> Result<(), WardenError> {
        let mut state = self.state.lock().await;
        if state.generation != generation {
            return Err(WardenError::ConcurrentModification);
        }
        if changes.is_empty() {
            return Ok(());
        }
        for (old, replacement) in &changes.replacements {
            if let Some(index) = state.position(*old) {
                state.tasks[index] = Arc::clone(replacement);
            }
        }
        state
            .tasks
            .retain(|task| !changes.removals.contains(&task.id()));
        state.touch();
        Ok(())
    }

    /// Remove every terminated task. Returns how many were removed.
    pub async fn remove_all_terminated(&self) -> usize {
        self.remove_matching(|task| task.state().is_terminal()).await
    }

    /// Best effort: decides on a snapshot and retries the whole scan if the
    /// list changed in between.
    pub(crate) async fn remove_matching(&self, matches: impl Fn(&Task) -> bool) -> usize {
        loop {
            let (snapshot, generation) = self.snapshot_with_generation().await;
            let removals: HashSet<TaskId> = snapshot
                .iter()
                .filter(|task| matches(task))
                .map(|task| task.id())
                .collect();
            let removed = removals.len();
            let changes = RegistryChanges {
                removals,
                ..RegistryChanges::default()
            };
            match self.commit(generation, &changes).await {
                Ok(()) => return removed,
                Err(_) => tokio::task::yield_now().await,
            }
        }
    }

    pub async fn contains(&self, id: TaskId) -> bool {
        self.state.lock().await.position(id).is_some()
    }

    pub async fn position(&self, id: TaskId) -> Option<usize> {
        self.state.lock().await.position(id)
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.tasks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.tasks.is_empty()
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}
