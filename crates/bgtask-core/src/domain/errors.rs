//! Errors - タスク操作のエラー型
//!
//! # 伝播の方針
//! - `InvalidArgument` / `DuplicateName` / `NotFound`: 呼び出し元に同期的に返す
//! - `ExecutionFailed`: `fire` からは返さない。Delegate に Outcome として届ける
//! - `SchedulerRejected` / `ShuttingDown`: 登録・発火の受付時に同期的に返す

use thiserror::Error;

use super::ids::TaskKey;
use super::outcome::TaskFailure;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TaskError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("task {0} is already registered")]
    DuplicateName(TaskKey),

    #[error("task {0} is not registered")]
    NotFound(TaskKey),

    #[error("execution failed: {0}")]
    ExecutionFailed(TaskFailure),

    #[error("background scheduler rejected task {key}: {reason}")]
    SchedulerRejected { key: TaskKey, reason: String },

    #[error("dispatcher is shutting down")]
    ShuttingDown,
}

impl TaskError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_task() {
        let err = TaskError::DuplicateName(TaskKey::new("app1", "sync"));
        assert_eq!(err.to_string(), "task app1/sync is already registered");

        let err = TaskError::NotFound(TaskKey::new("app1", "gone"));
        assert!(err.to_string().contains("app1/gone"));
    }

    #[test]
    fn execution_failed_wraps_the_failure_payload() {
        let err = TaskError::ExecutionFailed(TaskFailure::new("E_NET", "offline"));
        assert_eq!(err.to_string(), "execution failed: E_NET: offline");
    }
}
