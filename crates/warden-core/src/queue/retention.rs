//! Retention policy: how long and how many terminated tasks stay visible.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Limits for one outcome class (successful or failed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Maximum number of tasks to keep.
    pub max_count: usize,

    /// Maximum time to keep a task after its death was first observed.
    pub max_age: Duration,
}

impl RetentionPolicy {
    pub fn new(max_count: usize, max_age: Duration) -> Self {
        Self { max_count, max_age }
    }

    /// Has a task that died at `died` outlived `max_age` by `now`?
    ///
    /// Strictly greater: a task exactly `max_age` old is kept.
    pub fn is_expired(&self, died: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        // A clock that went backwards yields a negative age, read as zero.
        let age = (now - died).to_std().unwrap_or_default();
        age > self.max_age
    }

    /// How many of `kept` tasks exceed `max_count`.
    pub fn excess(&self, kept: usize) -> usize {
        kept.saturating_sub(self.max_count)
    }
}

/// Separate limits for successful and failed tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retention {
    pub successful: RetentionPolicy,
    pub failed: RetentionPolicy,
}

impl Default for Retention {
    /// 3 successful tasks for 20 minutes, 10 failed tasks for 4 hours.
    fn default() -> Self {
        Self {
            successful: RetentionPolicy::new(3, Duration::from_secs(20 * 60)),
            failed: RetentionPolicy::new(10, Duration::from_secs(4 * 60 * 60)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    #[test]
    fn default_limits() {
        let retention = Retention::default();
        assert_eq!(retention.successful.max_count, 3);
        assert_eq!(retention.successful.max_age, Duration::from_secs(1200));
        assert_eq!(retention.failed.max_count, 10);
        assert_eq!(retention.failed.max_age, Duration::from_secs(14400));
    }

    #[test]
    fn expiry_is_strict() {
        let policy = RetentionPolicy::new(3, Duration::from_secs(60));
        let died = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

        assert!(!policy.is_expired(died, died + TimeDelta::seconds(60)));
        assert!(policy.is_expired(died, died + TimeDelta::seconds(61)));
        assert!(!policy.is_expired(died, died - TimeDelta::seconds(5)));
    }

    #[test]
    fn excess_never_underflows() {
        let policy = RetentionPolicy::new(3, Duration::ZERO);
        assert_eq!(policy.excess(5), 2);
        assert_eq!(policy.excess(3), 0);
        assert_eq!(policy.excess(0), 0);
    }
}
