//! BackgroundScheduler port - OS 側のバックグラウンド実行基盤
//!
//! 実際の「バックグラウンド実行に登録する」「アプリを再起動する」は
//! プラットフォームごとに異なるので、ここでは trait だけを定義します。
//! スケジューラ側からの「発火」は `TaskDispatcher::fire` を呼ぶことで届きます。

use crate::domain::TaskDescriptor;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    #[error("background execution unavailable: {0}")]
    Unavailable(String),

    #[error("relaunch of {url} failed: {reason}")]
    RelaunchFailed { url: String, reason: String },
}

/// Register and unregister calls are serialized by the dispatcher and must not
/// call back into it. An unregister for a registration that has since been
/// replaced under the same key is never issued.
pub trait BackgroundScheduler: Send + Sync {
    /// Asks the platform to start firing this task. An error rolls back the registration.
    fn register_for_background(&self, task: &TaskDescriptor) -> Result<(), SchedulerError>;

    /// `task.registration()` identifies which registration is going away.
    fn unregister_from_background(&self, task: &TaskDescriptor);

    /// Asks the platform to bring the owning application back at `task.app_url()`.
    fn request_relaunch(&self, task: &TaskDescriptor) -> Result<(), SchedulerError>;
}
