//! Ports - 抽象化レイヤー
//!
//! スケジューラのコアが外部に依存する箇所（時刻、表示文字列）を trait として
//! 切り出す。本番実装とテスト実装を差し替え可能にする。

pub mod clock;
pub mod labels;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::labels::{LabelProvider, PlainLabels};
