//! DispatcherBuilder - ディスパッチャの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 既定値（NoopScheduler, NoopEventSink, SystemClock）

use std::sync::Arc;

use super::config::DispatcherConfig;
use super::dispatcher::TaskDispatcher;
use crate::impls::{NoopEventSink, NoopScheduler};
use crate::ports::{BackgroundScheduler, Clock, EventSink, SystemClock, TaskConsumer};
use crate::typed::{ConsumerKind, ConsumerRegistry, RegistryError};

/// DispatcherBuilder は TaskDispatcher を構築
///
/// # 使用例
/// ```ignore
/// let dispatcher = DispatcherBuilder::new()
///     .consumer::<SyncConsumer>()?
///     .expect_kinds(&["acme.sync.v1"])
///     .config(DispatcherConfig::from_env()?)
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - expect_kinds() で必要な consumer_kind を宣言
/// - build() 時に「期待集合 ⊆ 登録済み集合」をチェック
/// - 不足があれば BuildError を返す（register 時の InvalidArgument を待たない）
pub struct DispatcherBuilder {
    consumers: ConsumerRegistry,
    scheduler: Arc<dyn BackgroundScheduler>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    config: DispatcherConfig,
    expected_kinds: Option<Vec<String>>,
}

/// BuildError はディスパッチャ構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing consumer kinds: {0:?}. These kinds were expected but not registered.")]
    MissingConsumerKinds(Vec<String>),
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            consumers: ConsumerRegistry::new(),
            scheduler: Arc::new(NoopScheduler::new()),
            events: Arc::new(NoopEventSink),
            clock: Arc::new(SystemClock),
            config: DispatcherConfig::default(),
            expected_kinds: None,
        }
    }

    /// ConsumerKind を登録
    pub fn consumer<C: ConsumerKind>(mut self) -> Result<Self, RegistryError> {
        self.consumers.register::<C>()?;
        Ok(self)
    }

    /// クロージャで生成する Consumer を登録
    pub fn consumer_factory<F>(mut self, kind: impl Into<String>, f: F) -> Result<Self, RegistryError>
    where
        F: Fn() -> Result<Box<dyn TaskConsumer>, String> + Send + Sync + 'static,
    {
        self.consumers.register_factory(kind, f)?;
        Ok(self)
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn BackgroundScheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// 期待される consumer_kind のリストを設定
    pub fn expect_kinds(mut self, kinds: &[&str]) -> Self {
        self.expected_kinds = Some(kinds.iter().map(|k| k.to_string()).collect());
        self
    }

    pub fn build(self) -> Result<TaskDispatcher, BuildError> {
        if let Some(expected) = &self.expected_kinds {
            let missing: Vec<String> = expected
                .iter()
                .filter(|kind| !self.consumers.contains(kind))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingConsumerKinds(missing));
            }
        }
        tracing::debug!(kinds = ?self.consumers.kinds(), "building task dispatcher");
        Ok(TaskDispatcher::new(
            self.consumers,
            self.scheduler,
            self.events,
            self.clock,
            self.config,
        ))
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TaskDescriptor, TaskFailure};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::time::Duration;

    #[derive(Default)]
    struct Noop;

    #[async_trait]
    impl TaskConsumer for Noop {
        async fn execute(
            &self,
            _task: &TaskDescriptor,
            _data: Option<Value>,
            _error: Option<TaskFailure>,
        ) -> Result<Option<Value>, TaskFailure> {
            Ok(None)
        }
    }

    impl ConsumerKind for Noop {
        const KIND: &'static str = "test.noop.v1";
    }

    #[test]
    fn test_build_success() {
        let dispatcher = DispatcherBuilder::new()
            .consumer::<Noop>()
            .unwrap()
            .expect_kinds(&[Noop::KIND])
            .build();
        assert!(dispatcher.is_ok());
    }

    #[test]
    fn test_build_missing_kinds() {
        let dispatcher = DispatcherBuilder::new()
            .consumer::<Noop>()
            .unwrap()
            .expect_kinds(&[Noop::KIND, "test.location.v1"])
            .build();
        assert!(matches!(
            dispatcher,
            Err(BuildError::MissingConsumerKinds(missing)) if missing == vec!["test.location.v1".to_string()]
        ));
    }

    #[test]
    fn test_factory_and_config_are_wired() {
        let dispatcher = DispatcherBuilder::new()
            .consumer_factory("test.closure.v1", || Ok(Box::new(Noop) as Box<dyn TaskConsumer>))
            .unwrap()
            .config(DispatcherConfig::default().with_drain_timeout(Duration::from_millis(10)))
            .expect_kinds(&["test.closure.v1"])
            .build()
            .unwrap();
        assert_eq!(dispatcher.config().drain_timeout, Duration::from_millis(10));
    }

    #[test]
    fn test_duplicate_kind_fails_fast() {
        let result = DispatcherBuilder::new()
            .consumer::<Noop>()
            .unwrap()
            .consumer::<Noop>();
        assert!(matches!(result, Err(RegistryError::AlreadyRegistered(_))));
    }
}
