//! Small `Work` implementations for tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::domain::TaskFailure;
use crate::error::WardenError;
use crate::task::Task;
use crate::work::{Work, WorkContext, WorkFactory};

/// Implements `WorkFactory` for a unit struct that is also its own `Work`.
macro_rules! self_building {
    ($ty:ident, $kind:literal) => {
        impl WorkFactory for $ty {
            fn kind(&self) -> &str {
                $kind
            }

            fn build(&self) -> Result<Box<dyn Work>, WardenError> {
                Ok(Box::new($ty))
            }
        }
    };
}

/// Returns at once.
#[derive(Debug, Clone, Copy)]
pub struct Finishing;
self_building!(Finishing, "finishing");

#[async_trait]
impl Work for Finishing {
    async fn run(&self, _ctx: &WorkContext) -> Result<(), TaskFailure> {
        Ok(())
    }
}

/// Fails at once.
#[derive(Debug, Clone, Copy)]
pub struct Failing;
self_building!(Failing, "failing");

#[async_trait]
impl Work for Failing {
    async fn run(&self, _ctx: &WorkContext) -> Result<(), TaskFailure> {
        Err(TaskFailure::new("TestError", "intentional failure"))
    }
}

/// Panics at once.
#[derive(Debug, Clone, Copy)]
pub struct Panicking;
self_building!(Panicking, "panicking");

#[async_trait]
impl Work for Panicking {
    async fn run(&self, _ctx: &WorkContext) -> Result<(), TaskFailure> {
        panic!("intentional panic");
    }
}

/// Works until cancelled, then leaves through the cancelled condition.
#[derive(Debug, Clone, Copy)]
pub struct UntilCancelled;
self_building!(UntilCancelled, "untilCancelled");

#[async_trait]
impl Work for UntilCancelled {
    async fn run(&self, ctx: &WorkContext) -> Result<(), TaskFailure> {
        ctx.cancelled().await;
        ctx.check_cancelled()
    }
}

/// Asks to be restarted, then returns.
#[derive(Debug, Clone, Copy)]
pub struct RestartingItself;
self_building!(RestartingItself, "restartingItself");

#[async_trait]
impl Work for RestartingItself {
    async fn run(&self, ctx: &WorkContext) -> Result<(), TaskFailure> {
        ctx.mark_restartable();
        Ok(())
    }
}

/// Builds `Finishing` work a limited number of times, then fails to build.
#[derive(Debug)]
pub struct Brittle {
    builds_left: AtomicUsize,
}

impl Brittle {
    pub fn new(builds: usize) -> Self {
        Self {
            builds_left: AtomicUsize::new(builds),
        }
    }
}

impl WorkFactory for Brittle {
    fn kind(&self) -> &str {
        "brittle"
    }

    fn build(&self) -> Result<Box<dyn Work>, WardenError> {
        let left = self
            .builds_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match left {
            Ok(_) => Ok(Box::new(RestartingItself)),
            Err(_) => Err(WardenError::WorkConstruction {
                kind: self.kind().to_string(),
                message: "no builds left".to_string(),
            }),
        }
    }
}

/// Start a task and wait for its work to exit.
pub async fn terminated(factory: Arc<dyn WorkFactory>) -> Arc<Task> {
    let task = Task::new(factory).unwrap();
    task.start().unwrap();
    task.wait_terminated().await;
    task
}
