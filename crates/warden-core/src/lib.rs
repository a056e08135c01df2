//! warden-core
//!
//! Background task scheduler: cancellable units of work are registered in an
//! ordered queue, admitted under a concurrency ceiling by a periodic
//! housekeeper, restarted or pruned once they stop.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, behaviour, state, failure）
//! - **task**: Task 本体（進捗・失敗・処分・実行）
//! - **work**: 実際の処理を書くための trait（Work, WorkFactory, WorkContext）
//! - **queue**: レジストリと保持ポリシー
//! - **app**: スケジューラ（builder, scheduler, housekeeper, status）
//! - **ports**: 抽象化レイヤー（Clock, LabelProvider）
//! - **config**: TOML 設定
//! - **error**: エラー型

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
pub mod queue;
pub mod task;
pub mod work;

#[cfg(test)]
mod test_utils;

pub use app::{Scheduler, SchedulerBuilder, TaskCounts, TaskView};
pub use config::SchedulerConfig;
pub use domain::{Behaviour, TaskFailure, TaskId, TaskState};
pub use error::WardenError;
pub use task::Task;
pub use work::{SampleTask, Work, WorkContext, WorkFactory};
