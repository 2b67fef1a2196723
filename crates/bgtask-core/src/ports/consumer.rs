//! TaskConsumer port - 発火したタスクの実処理
//!
//! Consumer はアプリケーション側が実装します。タスクの「種類」(kind) ごとに
//! 1 実装を用意し、`typed::ConsumerRegistry` に登録しておくと、
//! `register` のたびに新しいインスタンスが作られます。

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{TaskDescriptor, TaskFailure};

/// TaskConsumer は 1 回の発火を処理して結果（または失敗）を返す
///
/// # 使用例
/// ```ignore
/// struct SyncConsumer;
///
/// #[async_trait]
/// impl TaskConsumer for SyncConsumer {
///     async fn execute(
///         &self,
///         task: &TaskDescriptor,
///         data: Option<Value>,
///         error: Option<TaskFailure>,
///     ) -> Result<Option<Value>, TaskFailure> {
///         Ok(data)
///     }
/// }
/// ```
///
/// # 契約
/// - 1 回の呼び出しにつき結果はちょうど 1 つ（`Ok` / `Err` / panic のいずれか）
/// - await で中断してよい。ディスパッチャは完了を待ってから Delegate に転送する
/// - 同じタスクの `execute` が重なって呼ばれることはない
#[async_trait]
pub trait TaskConsumer: Send + Sync {
    async fn execute(
        &self,
        task: &TaskDescriptor,
        data: Option<Value>,
        error: Option<TaskFailure>,
    ) -> Result<Option<Value>, TaskFailure>;

    /// Called once after the task has been registered.
    fn did_register(&self, _task: &TaskDescriptor) {}

    /// Called once after the task has been unregistered.
    fn did_unregister(&self, _task: &TaskDescriptor) {}

    fn did_update_options(&self, _task: &TaskDescriptor) {}
}
