//! ConsumerKind trait - consumer_kind 文字列と Consumer 型の対応付け
//!
//! # 学習ポイント
//! - Associated Constants (`const KIND`)
//! - `Default` で引数なし生成（登録のたびに新しいインスタンスを作る）

use crate::ports::TaskConsumer;

/// ConsumerKind は kind 文字列と Consumer 型を対応付ける
///
/// # 使用例
/// ```ignore
/// #[derive(Default)]
/// struct SyncConsumer;
///
/// impl ConsumerKind for SyncConsumer {
///     const KIND: &'static str = "acme.sync.v1";
/// }
/// ```
///
/// # 命名規約
/// - `{namespace}.{purpose}.v{major}`
/// - 例: `acme.location.updates.v1`
pub trait ConsumerKind: TaskConsumer + Default + 'static {
    const KIND: &'static str;
}
