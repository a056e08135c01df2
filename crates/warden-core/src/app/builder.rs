//! SchedulerBuilder - スケジューラの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）

use std::sync::Arc;

use super::ceiling::AutoRunLimit;
use super::housekeeper::Housekeeper;
use super::scheduler::Scheduler;
use crate::config::SchedulerConfig;
use crate::error::WardenError;
use crate::ports::{Clock, LabelProvider, PlainLabels, SystemClock};
use crate::queue::TaskRegistry;

/// SchedulerBuilder は設定・時計・翻訳を組み合わせて Scheduler を構築
///
/// # 使用例
/// ```ignore
/// let scheduler = SchedulerBuilder::new()
///     .config(SchedulerConfig::load("warden.toml")?)
///     .labels(Arc::new(MyLabels))
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - build() 時に設定を検証し、不正なら InvalidConfig を返す
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    labels: Arc<dyn LabelProvider>,
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        Self {
            config: SchedulerConfig::default(),
            clock: Arc::new(SystemClock),
            labels: Arc::new(PlainLabels),
        }
    }

    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// 保持期限の判定に使う時計（テストでは FixedClock）
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn labels(mut self, labels: Arc<dyn LabelProvider>) -> Self {
        self.labels = labels;
        self
    }

    /// # 検証
    /// - tick 間隔が 0 でないこと
    pub fn build(self) -> Result<Scheduler, WardenError> {
        if self.config.inspection_interval_millis == 0 {
            return Err(WardenError::InvalidConfig(
                "inspection_interval_millis must be greater than zero".to_string(),
            ));
        }

        let registry = Arc::new(TaskRegistry::new());
        let ceiling = Arc::new(AutoRunLimit::new(self.config.auto_run_limit()));
        let housekeeper = Arc::new(Housekeeper::new(
            Arc::clone(&registry),
            Arc::clone(&ceiling),
            self.config.retention(),
            self.clock,
        ));
        Ok(Scheduler::new(
            registry,
            ceiling,
            housekeeper,
            self.labels,
            self.config.inspection_interval(),
        ))
    }
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
