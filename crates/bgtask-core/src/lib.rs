//! bgtask-core
//!
//! Core building blocks for registering named background tasks and dispatching
//! their firings.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（TaskKey, ids, TaskOptions, Outcome, TaskDescriptor, errors, events）
//! - **ports**: 抽象化レイヤー（TaskConsumer, TaskDelegate, BackgroundScheduler, EventSink, Clock, IdGenerator）
//! - **typed**: 型付き Consumer API（ConsumerKind trait, ConsumerFactory, ConsumerRegistry）
//! - **impls**: 実装（NoopScheduler, MemoryEventSink など開発用）
//! - **app**: アプリケーションロジック（builder, dispatcher, config, status）
//!
//! ログは `tracing` で出します。subscriber の設定は利用側の責務です。

pub mod domain;
pub mod ports;
pub mod typed;
pub mod impls;
pub mod app;

pub use app::{DispatcherBuilder, DispatcherConfig, Firing, FiringReport, TaskDispatcher};
pub use domain::{Delivery, Outcome, TaskDescriptor, TaskError, TaskFailure, TaskHandle, TaskOptions, TaskRegistration};
pub use ports::{TaskConsumer, TaskDelegate};
pub use typed::ConsumerKind;
