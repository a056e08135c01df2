//! Work - タスクが実行する処理の抽象化
//!
//! # 二層構造
//! - **WorkFactory**: 設定（再起動時にも使う）。新しい `Work` を組み立てる
//! - **Work**: 一度だけ実行される処理本体
//!
//! 実行を終えた Work は再実行できない。再起動は WorkFactory から新しい
//! インスタンスを作ることで行う。

pub mod context;
pub mod sample;

pub use self::context::WorkContext;
pub use self::sample::SampleTask;

use async_trait::async_trait;

use crate::domain::TaskFailure;
use crate::error::WardenError;

/// The body of a task. Runs once.
///
/// Cancellation is cooperative: the work must poll
/// [`WorkContext::is_cancellation_requested`] (or await
/// [`WorkContext::cancelled`]) at safe points and return on its own.
///
/// Returning `Err` captures the failure onto the task, unless it is the
/// cancelled condition and cancellation was requested.
#[async_trait]
pub trait Work: Send + Sync + 'static {
    async fn run(&self, ctx: &WorkContext) -> Result<(), TaskFailure>;
}

/// Configuration of a task: knows how to build a fresh, runnable [`Work`].
///
/// # Example
/// ```ignore
/// struct ExportBatch { batch: u64 }
///
/// impl WorkFactory for ExportBatch {
///     fn kind(&self) -> &str { "exportBatchTask" }
///     fn build(&self) -> Result<Box<dyn Work>, WardenError> {
///         Ok(Box::new(ExportBatchWork::open(self.batch)?))
///     }
/// }
/// ```
pub trait WorkFactory: Send + Sync + 'static {
    /// Label key naming the kind of work; the base of the display name.
    fn kind(&self) -> &str;

    /// Build a fresh unit of work from this configuration.
    fn build(&self) -> Result<Box<dyn Work>, WardenError>;
}
