//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **NoopScheduler**: OS 連携なしの BackgroundScheduler
//! - **NoopEventSink / MemoryEventSink / TracingEventSink**: EventSink
//!
//! 本番の BackgroundScheduler はプラットフォームごとに別クレートで実装します。

pub mod noop_scheduler;
pub mod event_sinks;

pub use self::noop_scheduler::NoopScheduler;
pub use self::event_sinks::{MemoryEventSink, NoopEventSink, TracingEventSink};
