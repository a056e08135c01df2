//! Failures captured onto a task.
//!
//! A failure is a value, not a propagated error: the worker hands it to its
//! task and the task keeps the first one it gets.

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The work returned an error.
    Error,

    /// The work reported that it was cancelled.
    Cancelled,

    /// The work panicked.
    Panicked,
}

impl FailureKind {
    /// Label shown in place of a type name for causes whose type is unknown.
    pub fn label(self) -> &'static str {
        match self {
            FailureKind::Error => "Error",
            FailureKind::Cancelled => "Cancelled",
            FailureKind::Panicked => "Panic",
        }
    }
}

/// A failure captured from a unit of work.
///
/// - `class`: short type name of the captured (outermost) error.
/// - `message`: message of that same error.
/// - `chain`: every message of the cause chain, outermost first.
///
/// `Display` shows the root cause. Only the outermost type is known, so a
/// deeper root cause is labelled with the failure kind instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    kind: FailureKind,
    class: String,
    message: String,
    chain: Vec<String>,
}

impl TaskFailure {
    pub fn new(class: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: FailureKind::Error,
            class: class.into(),
            chain: vec![message.clone()],
            message,
        }
    }

    /// The "cancelled" condition. Not a failure if cancellation was requested.
    pub fn cancelled() -> Self {
        Self {
            kind: FailureKind::Cancelled,
            class: "Cancelled".to_string(),
            message: "task was cancelled".to_string(),
            chain: vec!["task was cancelled".to_string()],
        }
    }

    /// Capture an error, walking its `source()` chain down to the root cause.
    pub fn from_error<E: std::error::Error>(err: &E) -> Self {
        let mut chain = vec![err.to_string()];
        let mut source = err.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }
        let message = err.to_string();
        Self {
            kind: FailureKind::Error,
            class: short_type_name(std::any::type_name::<E>()).to_string(),
            message,
            chain,
        }
    }

    /// Capture the payload of a panic.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "panic with a non-string payload".to_string()
        };
        Self {
            kind: FailureKind::Panicked,
            class: "Panic".to_string(),
            chain: vec![message.clone()],
            message,
        }
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn chain(&self) -> &[String] {
        &self.chain
    }

    /// Message of the innermost cause.
    pub fn root_cause(&self) -> &str {
        self.chain.last().map_or(self.message.as_str(), String::as_str)
    }

    pub fn is_cancellation(&self) -> bool {
        self.kind == FailureKind::Cancelled
    }

    /// The whole cause chain, one cause per line.
    pub fn long_message(&self) -> String {
        let mut out = format!("{}: {}", self.class, self.message);
        for cause in self.chain.iter().skip(1) {
            out.push_str("\ncaused by: ");
            out.push_str(cause);
        }
        out
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.chain.len() > 1 {
            write!(f, "{}: {}", self.kind.label(), self.root_cause())
        } else {
            write!(f, "{}: {}", self.class, self.message)
        }
    }
}

// TaskFailure must not implement std::error::Error, or this would overlap with `From<T> for T`.
impl<E> From<E> for TaskFailure
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Self::from_error(&err)
    }
}

fn short_type_name(full: &str) -> &str {
    let without_generics = full.split('<').next().unwrap_or(full);
    without_generics.rsplit("::").next().unwrap_or(without_generics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("export failed")]
    struct ExportError {
        #[source]
        source: std::io::Error,
    }

    #[test]
    fn from_error_pairs_type_with_its_own_message() {
        let err = ExportError {
            source: std::io::Error::other("disk full"),
        };
        let failure = TaskFailure::from_error(&err);

        assert_eq!(failure.kind(), FailureKind::Error);
        assert_eq!(failure.class(), "ExportError");
        assert_eq!(failure.message(), "export failed");
        assert_eq!(failure.root_cause(), "disk full");
        assert_eq!(failure.chain(), ["export failed", "disk full"]);
    }

    #[test]
    fn display_never_mixes_outer_type_with_root_message() {
        let wrapped = TaskFailure::from(ExportError {
            source: std::io::Error::other("disk full"),
        });
        assert_eq!(wrapped.to_string(), "Error: disk full");

        let flat = TaskFailure::from_error(&std::fmt::Error);
        assert_eq!(flat.chain().len(), 1);
        assert_eq!(flat.to_string(), format!("Error: {}", std::fmt::Error));

        let named = TaskFailure::new("TestError", "intentional failure");
        assert_eq!(named.to_string(), "TestError: intentional failure");
    }

    #[test]
    fn long_message_lists_every_cause() {
        let err = ExportError {
            source: std::io::Error::other("disk full"),
        };
        let failure = TaskFailure::from(err);
        assert_eq!(
            failure.long_message(),
            "ExportError: export failed\ncaused by: disk full"
        );
    }

    #[test]
    fn from_panic_reads_string_payloads() {
        let failure = TaskFailure::from_panic(Box::new("boom"));
        assert_eq!(failure.kind(), FailureKind::Panicked);
        assert_eq!(failure.message(), "boom");

        let failure = TaskFailure::from_panic(Box::new(String::from("bang")));
        assert_eq!(failure.message(), "bang");

        let failure = TaskFailure::from_panic(Box::new(42_u32));
        assert_eq!(failure.message(), "panic with a non-string payload");
    }

    #[test]
    fn cancelled_is_a_cancellation() {
        assert!(TaskFailure::cancelled().is_cancellation());
        assert!(!TaskFailure::new("TestError", "x").is_cancellation());
    }

    #[test]
    fn short_type_name_strips_paths_and_generics() {
        assert_eq!(short_type_name("std::io::error::Error"), "Error");
        assert_eq!(short_type_name("a::b::Wrapper<c::Inner>"), "Wrapper");
        assert_eq!(short_type_name("Plain"), "Plain");
    }
}
