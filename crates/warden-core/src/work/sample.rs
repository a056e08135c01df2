//! Demonstration task: fills the progress gauge one percent at a time.

use std::time::Duration;

use async_trait::async_trait;

use super::{Work, WorkContext, WorkFactory};
use crate::domain::TaskFailure;
use crate::error::WardenError;

/// Does nothing useful. Reports each step as its work detail, waits
/// `step_delay`, then advances progress; leaves early when cancelled.
#[derive(Debug, Clone)]
pub struct SampleTask {
    step_delay: Duration,
}

impl SampleTask {
    pub fn new(step_delay: Duration) -> Self {
        Self { step_delay }
    }
}

impl Default for SampleTask {
    fn default() -> Self {
        Self::new(Duration::from_millis(1024))
    }
}

impl WorkFactory for SampleTask {
    fn kind(&self) -> &str {
        "sampleTask"
    }

    fn build(&self) -> Result<Box<dyn Work>, WardenError> {
        Ok(Box::new(SampleWork {
            step_delay: self.step_delay,
        }))
    }
}

struct SampleWork {
    step_delay: Duration,
}

#[async_trait]
impl Work for SampleWork {
    async fn run(&self, ctx: &WorkContext) -> Result<(), TaskFailure> {
        for step in 1..=100 {
            ctx.report_work_detail(step.to_string());

            tokio::select! {
                _ = ctx.cancelled() => return Ok(()),
                _ = tokio::time::sleep(self.step_delay) => {}
            }

            ctx.report_progress(step)?;
        }
        Ok(())
    }
}
