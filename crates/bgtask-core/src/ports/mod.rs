//! Ports - 外部とのつなぎ目
//!
//! コアが「呼ぶ」側の抽象（Consumer, Delegate, Scheduler, EventSink）と、
//! テスト容易性のための抽象（Clock, IdGenerator）を定義します。
//! 実装はアプリケーション側、または `impls` にあります。

pub mod consumer;
pub mod delegate;
pub mod scheduler;
pub mod event_sink;
pub mod clock;
pub mod id_generator;

pub use self::consumer::TaskConsumer;
pub use self::delegate::TaskDelegate;
pub use self::scheduler::{BackgroundScheduler, SchedulerError};
pub use self::event_sink::EventSink;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
