//! Outcome model: what one firing produced and whether anyone heard about it.
//!
//! `TaskFailure` is the error payload that travels in both directions: the
//! scheduler may hand one to the consumer (the `error` argument of a firing),
//! and a failed execution hands one to the delegate.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::TaskError;

/// Serializable error payload (code + human readable message).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct TaskFailure {
    pub code: String,
    pub message: String,
}

impl TaskFailure {
    /// Code used when the consumer panicked instead of reporting an error.
    pub const EXECUTION_FAILED: &'static str = "EXECUTION_FAILED";

    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn execution_failed(message: impl Into<String>) -> Self {
        Self::new(Self::EXECUTION_FAILED, message)
    }
}

/// Result of one consumer execution.
///
/// `FAILED` is the `ExecutionFailed` error in payload form: it is delivered to
/// the delegate instead of being raised to whoever fired the task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Success {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
    Failed {
        error: TaskFailure,
    },
}

impl Outcome {
    pub fn success(data: Option<Value>) -> Self {
        Self::Success { data }
    }

    pub fn failed(error: TaskFailure) -> Self {
        Self::Failed { error }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Success { data } => data.as_ref(),
            Self::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&TaskFailure> {
        match self {
            Self::Success { .. } => None,
            Self::Failed { error } => Some(error),
        }
    }

    pub fn into_result(self) -> Result<Option<Value>, TaskError> {
        match self {
            Self::Success { data } => Ok(data),
            Self::Failed { error } => Err(TaskError::ExecutionFailed(error)),
        }
    }
}

/// What happened to an outcome after execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Delivery {
    /// The delegate was notified.
    Delivered,
    /// No delegate was set, or it has already been dropped.
    NoDelegate,
    /// The task was unregistered before delivery.
    Unregistered,
    /// The delegate panicked while being notified.
    DelegatePanicked,
}

impl Delivery {
    pub fn is_delivered(self) -> bool {
        self == Self::Delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outcome_serializes_with_kind_tag() {
        let v = serde_json::to_value(Outcome::success(Some(json!({"items": 3})))).unwrap();
        assert_eq!(v, json!({"kind": "SUCCESS", "data": {"items": 3}}));

        let v = serde_json::to_value(Outcome::failed(TaskFailure::new("E", "boom"))).unwrap();
        assert_eq!(v["kind"], "FAILED");
        assert_eq!(v["error"]["code"], "E");
    }

    #[test]
    fn failed_outcome_becomes_execution_failed() {
        let failure = TaskFailure::new("E_IO", "disk full");
        let err = Outcome::failed(failure.clone()).into_result().unwrap_err();
        assert_eq!(err, TaskError::ExecutionFailed(failure));
    }

    #[test]
    fn accessors_follow_variant() {
        let ok = Outcome::success(Some(json!(1)));
        assert!(ok.is_success());
        assert_eq!(ok.data(), Some(&json!(1)));
        assert!(ok.error().is_none());

        let failed = Outcome::failed(TaskFailure::execution_failed("panic"));
        assert!(!failed.is_success());
        assert!(failed.data().is_none());
        assert_eq!(
            failed.error().map(|e| e.code.as_str()),
            Some(TaskFailure::EXECUTION_FAILED)
        );
    }
}
