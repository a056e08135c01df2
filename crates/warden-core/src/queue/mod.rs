//! Queue module: the task registry and the retention limits applied to it.

mod registry;
mod retention;

pub use registry::{Direction, TaskRegistry};
pub(crate) use registry::RegistryChanges;
pub use retention::{Retention, RetentionPolicy};
