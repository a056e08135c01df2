//! Scheduler configuration, read from the `[task_manager]` table of a TOML file.
//!
//! ```toml
//! [task_manager]
//! inspection_interval_millis = 2000
//! auto_run_limit = 4
//!
//! [task_manager.keep_threads.successful]
//! count = 3
//! minutes = 20
//!
//! [task_manager.keep_threads.failed]
//! count = 10
//! minutes = 240
//! ```

use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::WardenError;
use crate::queue::{Retention, RetentionPolicy};

const DEFAULT_INSPECTION_INTERVAL_MILLIS: u64 = 2000;

/// Every field is optional; missing ones take the defaults documented below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Time between two housekeeper ticks. Defaults to 2000 ms.
    pub inspection_interval_millis: u64,

    /// Number of tasks allowed to run at once. Defaults to the number of
    /// available hardware threads.
    pub auto_run_limit: Option<usize>,

    pub keep_threads: KeepThreads,

    /// Whether a front end should offer to add a sample task. Demo only.
    pub show_sample_task: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepThreads {
    /// Defaults to 3 tasks for 20 minutes.
    pub successful: KeepLimit,

    /// Defaults to 10 tasks for 240 minutes.
    pub failed: KeepLimit,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepLimit {
    pub count: Option<usize>,
    pub minutes: Option<u64>,
}

impl KeepLimit {
    fn resolve(&self, fallback: RetentionPolicy) -> RetentionPolicy {
        RetentionPolicy {
            max_count: self.count.unwrap_or(fallback.max_count),
            max_age: self
                .minutes
                .map_or(fallback.max_age, |m| Duration::from_secs(m.saturating_mul(60))),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            inspection_interval_millis: DEFAULT_INSPECTION_INTERVAL_MILLIS,
            auto_run_limit: None,
            keep_threads: KeepThreads::default(),
            show_sample_task: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    task_manager: SchedulerConfig,
}

impl SchedulerConfig {
    /// Parse the `[task_manager]` table of a TOML document. A document
    /// without that table yields the defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, WardenError> {
        let file: ConfigFile =
            toml::from_str(s).map_err(|e| WardenError::Config(format!("parse: {e}")))?;
        Ok(file.task_manager)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, WardenError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| WardenError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn inspection_interval(&self) -> Duration {
        Duration::from_millis(self.inspection_interval_millis)
    }

    /// The configured limit, or the available parallelism.
    pub fn auto_run_limit(&self) -> usize {
        self.auto_run_limit.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        })
    }

    pub fn retention(&self) -> Retention {
        let defaults = Retention::default();
        Retention {
            successful: self.keep_threads.successful.resolve(defaults.successful),
            failed: self.keep_threads.failed.resolve(defaults.failed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = SchedulerConfig::from_toml_str("").unwrap();
        assert_eq!(config, SchedulerConfig::default());
        assert_eq!(config.inspection_interval(), Duration::from_secs(2));
        assert_eq!(config.retention(), Retention::default());
        assert!(config.auto_run_limit() >= 1);
    }

    #[test]
    fn reads_the_task_manager_table() {
        let config = SchedulerConfig::from_toml_str(
            r#"
            [task_manager]
            inspection_interval_millis = 500
            auto_run_limit = 2
            show_sample_task = true

            [task_manager.keep_threads.successful]
            count = 1
            minutes = 5

            [task_manager.keep_threads.failed]
            minutes = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.inspection_interval(), Duration::from_millis(500));
        assert_eq!(config.auto_run_limit(), 2);
        assert!(config.show_sample_task);

        let retention = config.retention();
        assert_eq!(
            retention.successful,
            RetentionPolicy::new(1, Duration::from_secs(300))
        );
        // count falls back to its default, minutes do not
        assert_eq!(
            retention.failed,
            RetentionPolicy::new(10, Duration::from_secs(3600))
        );
    }

    #[test]
    fn zero_auto_run_limit_is_kept() {
        let config = SchedulerConfig::from_toml_str("[task_manager]\nauto_run_limit = 0").unwrap();
        assert_eq!(config.auto_run_limit(), 0);
    }

    #[test]
    fn malformed_documents_are_config_errors() {
        let err = SchedulerConfig::from_toml_str("[task_manager]\nauto_run_limit = \"many\"")
            .unwrap_err();
        assert!(matches!(err, WardenError::Config(_)));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = SchedulerConfig::load("/nonexistent/warden.toml").unwrap_err();
        assert!(matches!(err, WardenError::Config(msg) if msg.contains("/nonexistent/warden.toml")));
    }
}
