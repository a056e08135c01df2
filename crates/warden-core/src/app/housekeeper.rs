//! Housekeeper - 定期的な整理と起動
//!
//! 1 tick ごとに:
//! 1. レジストリのスナップショットを 1 回だけ走査して分類する
//! 2. 保持数を超えた終了済みタスクを古い順に削除する
//! 3. 空き枠の分だけ NEW のタスクを先頭から起動する
//!
//! 走査中に他者がレジストリを変更していた場合、その tick は何もせずに終わる。
//! 次の tick が最初からやり直す。

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::ceiling::AutoRunLimit;
use crate::domain::{Behaviour, TaskFailure, TaskId, TaskState};
use crate::ports::Clock;
use crate::queue::{RegistryChanges, Retention, TaskRegistry};
use crate::task::Task;

/// 1 tick の結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// 起動したタスク（レジストリ順）
    pub admitted: Vec<TaskId>,

    /// 新しいコピーに置き換えたタスク数
    pub restarted: usize,

    /// レジストリから削除したタスク数
    pub removed: usize,

    /// 並行変更を検出して中断したか
    pub aborted: bool,
}

impl TickReport {
    fn aborted() -> Self {
        Self {
            aborted: true,
            ..Self::default()
        }
    }
}

/// 走査結果。コミット前の変更と起動候補
#[derive(Debug, Default)]
struct Plan {
    changes: RegistryChanges,
    launchable: Vec<Arc<Task>>,
    clearance: usize,
}

/// Housekeeper はレジストリを定期的に整理する
///
/// # 設計
/// - 分類はロックの外でスナップショットに対して行う
/// - 変更はジェネレーションが変わっていない場合にのみコミットする
/// - tick は単一のループから呼ばれるので重ならない
pub struct Housekeeper {
    registry: Arc<TaskRegistry>,
    ceiling: Arc<AutoRunLimit>,
    retention: Retention,
    clock: Arc<dyn Clock>,
}

impl Housekeeper {
    pub fn new(
        registry: Arc<TaskRegistry>,
        ceiling: Arc<AutoRunLimit>,
        retention: Retention,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            ceiling,
            retention,
            clock,
        }
    }

    pub fn retention(&self) -> Retention {
        self.retention
    }

    /// 1 回分の整理と起動を行う
    pub async fn tick(&self) -> TickReport {
        let (snapshot, generation) = self.registry.snapshot_with_generation().await;
        let plan = self.classify(&snapshot);
        self.apply(generation, plan).await
    }

    /// 分類と保持数による間引き。レジストリには触れない
    fn classify(&self, snapshot: &[Arc<Task>]) -> Plan {
        let now = self.clock.now();
        let mut plan = Plan {
            clearance: self.ceiling.limit(),
            ..Plan::default()
        };
        let mut finished: Vec<TaskId> = Vec::new();
        let mut failed: Vec<TaskId> = Vec::new();

        for task in snapshot {
            let state = task.state();
            match state {
                TaskState::Working | TaskState::Stopping => {
                    plan.clearance = plan.clearance.saturating_sub(1);
                }
                TaskState::New => {
                    if task.disposition() == Some(Behaviour::DeleteImmediately) {
                        plan.changes.removals.insert(task.id());
                    } else {
                        plan.launchable.push(Arc::clone(task));
                    }
                }
                TaskState::Stopped | TaskState::Finished | TaskState::Crashed => {
                    match task.settle_disposition() {
                        Behaviour::DeleteImmediately => {
                            plan.changes.removals.insert(task.id());
                        }
                        Behaviour::PrepareForRestart => match task.clone_for_restart() {
                            Ok(replacement) => {
                                plan.changes
                                    .replacements
                                    .push((task.id(), Arc::clone(&replacement)));
                                plan.launchable.push(replacement);
                            }
                            Err(e) => {
                                error!(task = %task.id(), error = %e, "cannot prepare task for restart");
                                task.capture_failure(TaskFailure::from_error(&e));
                                task.force_disposition(Behaviour::KeepForAWhile);
                                task.mark_time_of_death(now);
                            }
                        },
                        Behaviour::KeepForAWhile => {
                            let Some(died) = task.time_of_death() else {
                                task.mark_time_of_death(now);
                                continue;
                            };
                            let (policy, bucket) = if state == TaskState::Crashed {
                                (self.retention.failed, &mut failed)
                            } else {
                                (self.retention.successful, &mut finished)
                            };
                            if policy.is_expired(died, now) {
                                plan.changes.removals.insert(task.id());
                            } else {
                                bucket.push(task.id());
                            }
                        }
                    }
                }
            }
        }

        // Buckets are in registry order, so the first entries are the oldest.
        for (bucket, policy) in [
            (finished, self.retention.successful),
            (failed, self.retention.failed),
        ] {
            let excess = policy.excess(bucket.len());
            plan.changes.removals.extend(bucket.into_iter().take(excess));
        }

        plan
    }

    async fn apply(&self, generation: u64, plan: Plan) -> TickReport {
        let Plan {
            changes,
            mut launchable,
            clearance,
        } = plan;

        if let Err(e) = self.registry.commit(generation, &changes).await {
            debug!(error = %e, "housekeeping tick abandoned");
            return TickReport::aborted();
        }

        let restarted = changes.replacements.len();
        let removed = changes.removals.len();
        if restarted > 0 || removed > 0 {
            info!(restarted, removed, "registry tidied");
        }

        launchable.truncate(clearance);
        let mut admitted = Vec::with_capacity(launchable.len());
        for task in launchable {
            match task.start() {
                Ok(()) => admitted.push(task.id()),
                // Started by hand since the snapshot was taken.
                Err(e) => debug!(task = %task.id(), error = %e, "skipping admission"),
            }
        }
        if !admitted.is_empty() {
            info!(count = admitted.len(), "tasks admitted");
        }

        TickReport {
            admitted,
            restarted,
            removed,
            aborted: false,
        }
    }

    /// `period` ごとに tick を呼ぶ。`shutdown` がキャンセルされると終了する
    pub async fn run(self: Arc<Self>, period: Duration, shutdown: CancellationToken) {
        info!(period_ms = period.as_millis() as u64, "housekeeper started");
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }
        info!("housekeeper stopped");
    }
}
