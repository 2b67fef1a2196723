//! EventSink port - ドメインイベントの記録先

use crate::domain::DomainEvent;

/// EventSink はドメインイベントを受け取る
///
/// registry のロックを持ったまま呼ばれることはありません。
pub trait EventSink: Send + Sync {
    fn emit(&self, event: DomainEvent);
}
