//! Scheduler - 生産者向けの窓口
//!
//! レジストリ・同時実行上限・ハウスキーパーをまとめて所有する。
//! グローバルな状態は持たず、ホストプロセスが明示的に構築・開始・停止する。

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::ceiling::AutoRunLimit;
use super::housekeeper::Housekeeper;
use super::status::{TaskCounts, TaskView};
use crate::domain::{Behaviour, ExecutionPhase, TaskId};
use crate::error::WardenError;
use crate::ports::LabelProvider;
use crate::queue::{Direction, TaskRegistry};
use crate::task::Task;

/// Scheduler はバックグラウンドタスクの登録・操作・一覧を提供する
///
/// # 使用例
/// ```ignore
/// let scheduler = SchedulerBuilder::new().config(config).build()?;
/// scheduler.start();
/// scheduler.register_task(Task::new(Arc::new(SampleTask::default()))?).await;
/// // ...
/// scheduler.shutdown_now().await;
/// ```
pub struct Scheduler {
    registry: Arc<TaskRegistry>,
    ceiling: Arc<AutoRunLimit>,
    housekeeper: Arc<Housekeeper>,
    labels: Arc<dyn LabelProvider>,
    inspection_interval: Duration,
    shutdown: CancellationToken,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub(crate) fn new(
        registry: Arc<TaskRegistry>,
        ceiling: Arc<AutoRunLimit>,
        housekeeper: Arc<Housekeeper>,
        labels: Arc<dyn LabelProvider>,
        inspection_interval: Duration,
    ) -> Self {
        Self {
            registry,
            ceiling,
            housekeeper,
            labels,
            inspection_interval,
            shutdown: CancellationToken::new(),
            loop_handle: Mutex::new(None),
        }
    }

    /// ハウスキーパーの定期実行を開始する（2 回目以降は何もしない）
    ///
    /// tokio ランタイム上で呼ぶこと。
    pub fn start(&self) {
        let mut handle = self
            .loop_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if handle.is_some() || self.shutdown.is_cancelled() {
            return;
        }
        let housekeeper = Arc::clone(&self.housekeeper);
        *handle = Some(tokio::spawn(
            housekeeper.run(self.inspection_interval, self.shutdown.clone()),
        ));
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn housekeeper(&self) -> &Arc<Housekeeper> {
        &self.housekeeper
    }

    // ---- producer API ----

    /// 末尾に追加する。次の tick 以降、空き枠があれば起動される
    pub async fn register_task(&self, task: Arc<Task>) -> bool {
        let added = self.registry.append(Arc::clone(&task)).await;
        if added {
            info!(task = %task.id(), kind = task.kind(), "task registered");
        }
        added
    }

    /// 上限を無視して直ちに起動する
    ///
    /// 未登録なら実行中タスクの直後に挿入する。
    pub async fn start_task(&self, task: Arc<Task>) -> Result<(), WardenError> {
        if !self.registry.contains(task.id()).await {
            self.registry
                .insert_after_last_running(Arc::clone(&task))
                .await;
        }
        task.start()?;
        info!(task = %task.id(), "task started by hand");
        Ok(())
    }

    /// 協調的な中断を要求する。未知の ID なら false
    pub async fn cancel_task(&self, id: TaskId, disposition: Behaviour) -> bool {
        match self.find(id).await {
            Some(task) => {
                task.request_cancellation(disposition);
                true
            }
            None => false,
        }
    }

    pub async fn reorder_earlier(&self, id: TaskId) -> bool {
        self.registry.swap_adjacent(id, Direction::Earlier).await
    }

    pub async fn reorder_later(&self, id: TaskId) -> bool {
        self.registry.swap_adjacent(id, Direction::Later).await
    }

    /// 削除可能（NEW または終了済み）なタスクを直ちに取り除く
    ///
    /// NEW のタスクは先に retire して、削除までの間に起動されないようにする。
    pub async fn remove_task(&self, id: TaskId) -> bool {
        let Some(task) = self.find(id).await else {
            return false;
        };
        if !task.is_deletable() {
            return false;
        }
        if task.execution_phase() != ExecutionPhase::Terminated && task.retire().is_err() {
            // admitted after the check above
            return false;
        }
        self.registry.remove(id).await.is_some()
    }

    /// レジストリ順のスナップショット
    pub async fn list_tasks(&self) -> Vec<Arc<Task>> {
        self.registry.snapshot().await
    }

    pub async fn task_views(&self) -> Vec<TaskView> {
        self.registry
            .snapshot()
            .await
            .iter()
            .map(|task| TaskView::of(task, self.labels.as_ref()))
            .collect()
    }

    pub async fn counts(&self) -> TaskCounts {
        TaskCounts::tally(self.registry.snapshot().await.iter().map(|t| t.state()))
    }

    /// 終了済みのタスクをすべて取り除く
    pub async fn clear_finished(&self) -> usize {
        let removed = self.registry.remove_all_terminated().await;
        info!(removed, "finished tasks cleared");
        removed
    }

    /// すべてのタスクに即時削除付きの中断を要求し、実行中でないものを取り除く
    ///
    /// 実行中のタスクは終了後の最初の tick で取り除かれる。
    pub async fn clear_all(&self) -> usize {
        self.cancel_everything().await;
        let removed = self
            .registry
            .remove_matching(|task| {
                matches!(
                    task.execution_phase(),
                    ExecutionPhase::NotStarted | ExecutionPhase::Terminated
                )
            })
            .await;
        info!(removed, "all tasks cleared");
        removed
    }

    // ---- auto-run ----

    pub fn set_auto_run(&self, enabled: bool) {
        self.ceiling.set_enabled(enabled);
        info!(enabled, limit = self.ceiling.limit(), "auto-run toggled");
    }

    pub fn is_auto_run(&self) -> bool {
        self.ceiling.is_enabled()
    }

    pub fn auto_run_limit(&self) -> usize {
        self.ceiling.limit()
    }

    // ---- lifecycle ----

    /// すべてのタスクに即時削除付きの中断を要求し、ハウスキーパーを止める
    pub async fn shutdown_now(&self) {
        self.cancel_everything().await;
        self.shutdown.cancel();

        let handle = self
            .loop_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "housekeeper loop ended abnormally");
            }
        }
        info!("scheduler shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    async fn cancel_everything(&self) {
        for task in self.registry.snapshot().await {
            task.request_cancellation(Behaviour::DeleteImmediately);
        }
    }

    async fn find(&self, id: TaskId) -> Option<Arc<Task>> {
        self.registry
            .snapshot()
            .await
            .into_iter()
            .find(|task| task.id() == id)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
