//! Status - タスク一覧の表示用ビュー
//!
//! UI やデモ用バイナリが JSON で描画できるよう、すべて Serialize を実装する。

use serde::Serialize;

use crate::domain::{TaskId, TaskState};
use crate::ports::LabelProvider;
use crate::task::Task;

/// 1 タスク分の表示用スナップショット
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskView {
    pub id: TaskId,
    pub display_name: String,
    pub state: TaskState,
    pub progress: u8,
    pub status: String,
    pub startable: bool,
    pub stoppable: bool,
    pub deletable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_message: Option<String>,
}

impl TaskView {
    pub fn of(task: &Task, labels: &dyn LabelProvider) -> Self {
        Self {
            id: task.id(),
            display_name: task.display_name(labels),
            state: task.state(),
            progress: task.progress(),
            status: task.status_line(labels),
            startable: task.is_startable(),
            stoppable: task.is_stoppable(),
            deletable: task.is_deletable(),
            long_message: task.long_message(),
        }
    }
}

/// 状態ごとの件数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskCounts {
    pub new: usize,
    pub working: usize,
    pub stopping: usize,
    pub stopped: usize,
    pub finished: usize,
    pub crashed: usize,
}

impl TaskCounts {
    pub fn tally(states: impl IntoIterator<Item = TaskState>) -> Self {
        let mut counts = Self::default();
        for state in states {
            *counts.slot(state) += 1;
        }
        counts
    }

    fn slot(&mut self, state: TaskState) -> &mut usize {
        match state {
            TaskState::New => &mut self.new,
            TaskState::Working => &mut self.working,
            TaskState::Stopping => &mut self.stopping,
            TaskState::Stopped => &mut self.stopped,
            TaskState::Finished => &mut self.finished,
            TaskState::Crashed => &mut self.crashed,
        }
    }

    pub fn total(&self) -> usize {
        self.new + self.working + self.stopping + self.stopped + self.finished + self.crashed
    }

    /// NEW / WORKING / STOPPING のいずれかが残っているか
    pub fn has_pending(&self) -> bool {
        self.new + self.working + self.stopping > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::PlainLabels;
    use crate::test_utils::{Failing, Finishing, terminated};
    use std::sync::Arc;

    #[test]
    fn counts_by_state() {
        let counts = TaskCounts::tally([
            TaskState::New,
            TaskState::New,
            TaskState::Working,
            TaskState::Crashed,
        ]);
        assert_eq!(counts.new, 2);
        assert_eq!(counts.working, 1);
        assert_eq!(counts.crashed, 1);
        assert_eq!(counts.total(), 4);
        assert!(counts.has_pending());

        let done = TaskCounts::tally([TaskState::Finished, TaskState::Stopped]);
        assert!(!done.has_pending());
    }

    #[test]
    fn view_of_a_new_task() {
        let task = Task::with_name_detail(Arc::new(Finishing), "batch 1").unwrap();
        let view = TaskView::of(&task, &PlainLabels);

        assert_eq!(view.id, task.id());
        assert_eq!(view.display_name, "finishing: batch 1");
        assert_eq!(view.state, TaskState::New);
        assert_eq!(view.status, "new");
        assert!(view.startable);
        assert!(!view.stoppable);
        assert!(view.deletable);
        assert!(view.long_message.is_none());
    }

    #[tokio::test]
    async fn crashed_view_serializes_with_long_message() {
        let task = terminated(Arc::new(Failing)).await;
        let view = TaskView::of(&task, &PlainLabels);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["state"], "CRASHED");
        assert_eq!(json["status"], "crashed (TestError: intentional failure)");
        assert!(json["long_message"].is_string());
    }
}
