//! TaskDelegate port - 実行結果の通知先

use crate::domain::{Outcome, TaskDescriptor};

/// TaskDelegate は発火 1 回につき最大 1 回 `notify` される
///
/// - Descriptor からは弱参照で保持される（Delegate の寿命を延ばさない）
/// - 呼び出し元をブロックし続けてはいけない（重い処理は自分で spawn する）
/// - panic はディスパッチャが捕まえて記録する。再試行はしない
pub trait TaskDelegate: Send + Sync {
    fn notify(&self, task: &TaskDescriptor, outcome: &Outcome);
}
