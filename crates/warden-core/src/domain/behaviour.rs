//! Disposition policy: what the housekeeper does with a task once it stops.

use serde::{Deserialize, Serialize};

/// Instruction to the housekeeper about a terminated task.
///
/// - `DeleteImmediately`: dispose of the task as soon as it has stopped, or
///   before it ever ran if it is still new.
/// - `KeepForAWhile`: the default. Keep the task visible, subject to count and
///   age limits configured separately for successful and failed outcomes.
/// - `PrepareForRestart`: replace the task in place by a fresh, not-yet-run
///   copy built from the same configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Behaviour {
    DeleteImmediately,
    #[default]
    KeepForAWhile,
    PrepareForRestart,
}
