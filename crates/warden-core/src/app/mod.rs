//! App - アプリケーション層
//!
//! このモジュールは、queue / ports を組み合わせてスケジューラを実装します。
//!
//! # 主要コンポーネント
//! - **SchedulerBuilder**: 設定の検証とワイヤリング
//! - **Scheduler**: 登録・中断・並べ替え・一覧・停止の窓口
//! - **Housekeeper**: 定期的な整理（保持期限・保持数）と起動
//! - **AutoRunLimit**: 同時実行数の上限と auto-run の切り替え
//! - **Status**: 一覧表示用のビュー

pub mod builder;
pub mod ceiling;
pub mod housekeeper;
pub mod scheduler;
pub mod status;

// 主要な型を再エクスポート
pub use self::builder::SchedulerBuilder;
pub use self::ceiling::AutoRunLimit;
pub use self::housekeeper::{Housekeeper, TickReport};
pub use self::scheduler::Scheduler;
pub use self::status::{TaskCounts, TaskView};
