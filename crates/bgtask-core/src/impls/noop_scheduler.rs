//! NoopScheduler - OS 連携のない環境用（テスト・デモ）
//!
//! 登録は常に受け付け、再起動要求はログに残すだけです。

use tracing::debug;

use crate::domain::TaskDescriptor;
use crate::ports::{BackgroundScheduler, SchedulerError};

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopScheduler;

impl NoopScheduler {
    pub fn new() -> Self {
        Self
    }
}

impl BackgroundScheduler for NoopScheduler {
    fn register_for_background(&self, task: &TaskDescriptor) -> Result<(), SchedulerError> {
        debug!(task = %task.key(), "noop scheduler: register");
        Ok(())
    }

    fn unregister_from_background(&self, task: &TaskDescriptor) {
        debug!(task = %task.key(), registration = %task.registration(), "noop scheduler: unregister");
    }

    fn request_relaunch(&self, task: &TaskDescriptor) -> Result<(), SchedulerError> {
        debug!(task = %task.key(), app_url = task.app_url(), "noop scheduler: relaunch requested");
        Ok(())
    }
}
