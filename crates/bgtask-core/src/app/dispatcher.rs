//! TaskDispatcher - 登録表と発火の調停役
//!
//! # フロー
//! 1. 外部スケジューラが `fire(app_id, name, data, error)` を呼ぶ
//! 2. 登録表から Descriptor を引く（なければ `NotFound`）
//! 3. 実行を spawn してすぐに戻る（`fire` 自体は実行失敗を返さない）
//! 4. キーごとのゲートを取ってから Consumer を実行し、結果を Delegate に転送
//!
//! # ロック
//! - 登録表は `std::sync::Mutex` 1 本。参照・変更の間だけ持ち、await を跨がない
//! - 同じキーの発火はゲート（async Mutex）で直列化。別キーは並行に走る
//! - スケジューラへの登録・解除は `background` ロックで直列化（順序: background → 登録表）

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::Value;
use tokio::sync::watch;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::builder::DispatcherBuilder;
use super::config::DispatcherConfig;
use super::firing::{Firing, FiringReport};
use super::registry::Registry;
use super::status::{Counters, DispatcherStatus, ShutdownReport};
use crate::domain::{
    Delivery, DomainEvent, FiringId, Outcome, TaskDescriptor, TaskError, TaskFailure, TaskHandle,
    TaskKey, TaskOptions, TaskRegistration, TaskSnapshot,
};
use crate::ports::{BackgroundScheduler, Clock, EventSink, IdGenerator, TaskDelegate, UlidGenerator};
use crate::typed::ConsumerRegistry;

/// TaskDispatcher はタスクの登録表と発火の入口
///
/// # 使用例
/// ```ignore
/// let dispatcher = TaskDispatcher::builder()
///     .consumer::<SyncConsumer>()?
///     .build()?;
///
/// dispatcher.register(TaskRegistration::new("app1", "sync", "app://app1", SyncConsumer::KIND))?;
/// let firing = dispatcher.fire("app1", "sync", Some(json!({"items": 3})), None)?;
/// let report = firing.wait().await;
/// ```
///
/// `Clone` は同じ登録表を共有します（内部は `Arc`）。
/// 初期状態は空の登録表。終了時は `shutdown` で実行中の発火を待ってから登録表を空にします。
#[derive(Clone)]
pub struct TaskDispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Mutex<Registry>,
    background: Mutex<()>,
    consumers: ConsumerRegistry,
    scheduler: Arc<dyn BackgroundScheduler>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    config: DispatcherConfig,
    closing: AtomicBool,
    in_flight: watch::Sender<usize>,
    counters: Counters,
}

/// Counts a firing as in flight until dropped, even if its future never runs.
struct InFlight(Arc<Inner>);

impl InFlight {
    fn enter(inner: &Arc<Inner>) -> Self {
        inner.in_flight.send_modify(|n| *n += 1);
        Self(Arc::clone(inner))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.send_modify(|n| *n = n.saturating_sub(1));
    }
}

impl TaskDispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    pub(crate) fn new(
        consumers: ConsumerRegistry,
        scheduler: Arc<dyn BackgroundScheduler>,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        config: DispatcherConfig,
    ) -> Self {
        let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
        let (in_flight, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                registry: Mutex::new(Registry::default()),
                background: Mutex::new(()),
                consumers,
                scheduler,
                events,
                clock,
                ids,
                config,
                closing: AtomicBool::new(false),
                in_flight,
                counters: Counters::default(),
            }),
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.inner.config
    }

    /// Registers a task and instantiates its consumer.
    ///
    /// # Errors
    /// - `InvalidArgument`: empty identity field, malformed options, unknown
    ///   consumer kind, or a consumer factory failure
    /// - `DuplicateName`: `(app_id, name)` is already registered
    /// - `SchedulerRejected`: the background scheduler refused the task
    /// - `ShuttingDown`
    pub fn register(&self, registration: TaskRegistration) -> Result<TaskHandle, TaskError> {
        let inner = &self.inner;
        inner.ensure_open()?;
        registration.validate()?;

        let key = registration.key();
        if inner.lock_registry().contains(&key) {
            return Err(TaskError::DuplicateName(key));
        }

        let registration_id = inner.ids.generate_registration_id();
        let descriptor = Arc::new(TaskDescriptor::from_kind(
            registration_id,
            registration,
            &inner.consumers,
        )?);
        {
            let _background = inner.lock_background();
            {
                let mut registry = inner.lock_registry();
                inner.ensure_open()?;
                registry.insert(Arc::clone(&descriptor))?;
            }
            if let Err(e) = inner.scheduler.register_for_background(&descriptor) {
                inner.lock_registry().remove_exact(&descriptor);
                descriptor.retire();
                warn!(app_id = key.app_id(), task = key.name(), error = %e, "background registration rejected");
                return Err(TaskError::SchedulerRejected {
                    key,
                    reason: e.to_string(),
                });
            }
        }

        descriptor.notify_registered();
        inner.events.emit(DomainEvent::TaskRegistered {
            key: key.clone(),
            registration: registration_id,
            consumer_kind: descriptor.consumer_kind().to_string(),
        });
        info!(
            app_id = key.app_id(),
            task = key.name(),
            kind = descriptor.consumer_kind(),
            registration = %registration_id,
            "task registered"
        );
        Ok(TaskHandle::new(key, registration_id))
    }

    /// Idempotent. An in-flight firing of the task completes, but its outcome is dropped.
    pub fn unregister(&self, app_id: &str, name: &str) {
        let key = TaskKey::new(app_id, name);
        let removed = self.inner.lock_registry().remove(&key);
        match removed {
            Some(descriptor) => self.inner.retire(&descriptor),
            None => debug!(app_id, task = name, "unregister: task was not registered"),
        }
    }

    /// Unregisters every task owned by `app_id` (the application was removed).
    pub fn unregister_app(&self, app_id: &str) -> usize {
        let removed = self.inner.lock_registry().remove_app(app_id);
        for descriptor in &removed {
            self.inner.retire(descriptor);
        }
        removed.len()
    }

    pub fn update_options(
        &self,
        app_id: &str,
        name: &str,
        options: TaskOptions,
    ) -> Result<(), TaskError> {
        options.validate()?;
        let key = TaskKey::new(app_id, name);
        let descriptor = {
            let registry = self.inner.lock_registry();
            let descriptor = registry
                .get(&key)
                .cloned()
                .ok_or_else(|| TaskError::NotFound(key.clone()))?;
            descriptor.set_options(options);
            descriptor
        };
        descriptor.notify_options_updated();
        self.inner.events.emit(DomainEvent::OptionsUpdated { key });
        debug!(app_id, task = name, "task options updated");
        Ok(())
    }

    pub fn set_delegate<D: TaskDelegate + 'static>(
        &self,
        app_id: &str,
        name: &str,
        delegate: &Arc<D>,
    ) -> Result<(), TaskError> {
        self.lookup(app_id, name)?.set_delegate(delegate);
        Ok(())
    }

    /// Same as `set_delegate`, for delegates held as `Arc<dyn TaskDelegate>`
    /// (pass `Arc::downgrade(&delegate)`).
    pub fn set_delegate_weak(
        &self,
        app_id: &str,
        name: &str,
        delegate: Weak<dyn TaskDelegate>,
    ) -> Result<(), TaskError> {
        self.lookup(app_id, name)?.set_delegate_weak(Some(delegate));
        Ok(())
    }

    pub fn clear_delegate(&self, app_id: &str, name: &str) -> Result<(), TaskError> {
        self.lookup(app_id, name)?.set_delegate_weak(None);
        Ok(())
    }

    pub fn get(&self, app_id: &str, name: &str) -> Option<Arc<TaskDescriptor>> {
        self.lookup(app_id, name).ok()
    }

    pub fn is_registered(&self, app_id: &str, name: &str) -> bool {
        self.inner
            .lock_registry()
            .contains(&TaskKey::new(app_id, name))
    }

    /// Tasks owned by `app_id`, sorted by name.
    pub fn tasks_for_app(&self, app_id: &str) -> Vec<TaskSnapshot> {
        let tasks = self.inner.lock_registry().for_app(app_id);
        tasks.iter().map(|d| d.snapshot()).collect()
    }

    /// Accepts one firing of a registered task and returns immediately.
    ///
    /// Execution failures never surface here: they go to the delegate (or are
    /// recorded and dropped). Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// - `NotFound`: the task is not registered (the scheduler should forget it)
    /// - `ShuttingDown`
    pub fn fire(
        &self,
        app_id: &str,
        name: &str,
        data: Option<Value>,
        error: Option<TaskFailure>,
    ) -> Result<Firing, TaskError> {
        let key = TaskKey::new(app_id, name);
        // shutdown flips `closing` under the same lock, so an accepted firing is always counted
        let (descriptor, gate, in_flight) = {
            let mut registry = self.inner.lock_registry();
            self.inner.ensure_open()?;
            let descriptor = registry
                .get(&key)
                .cloned()
                .ok_or_else(|| TaskError::NotFound(key.clone()))?;
            let gate = registry.gate(&key);
            (descriptor, gate, InFlight::enter(&self.inner))
        };

        let firing = self.inner.ids.generate_firing_id();
        let inner = Arc::clone(&self.inner);
        let span = info_span!("firing", app_id, task = name, firing = %firing);

        let handle = tokio::spawn(
            async move {
                let report = {
                    let _turn = gate.lock().await;
                    inner.run_firing(firing, &descriptor, data, error).await
                };
                drop(gate);
                inner.lock_registry().prune_gate(descriptor.key());
                drop(in_flight);
                report
            }
            .instrument(span),
        );

        Ok(Firing::new(firing, key, handle))
    }

    pub fn status(&self) -> DispatcherStatus {
        let registered = self.inner.lock_registry().len();
        let in_flight = *self.inner.in_flight.borrow();
        self.inner.counters.status(registered, in_flight)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.closing.load(Ordering::Acquire)
    }

    /// Stops accepting work, waits for in-flight firings (up to `drain_timeout`),
    /// then unregisters everything.
    pub async fn shutdown(&self) -> ShutdownReport {
        {
            let _registry = self.inner.lock_registry();
            self.inner.closing.store(true, Ordering::Release);
        }

        let drain_timeout = self.inner.config.drain_timeout;
        let mut in_flight = self.inner.in_flight.subscribe();
        let drained = matches!(
            tokio::time::timeout(drain_timeout, in_flight.wait_for(|n| *n == 0)).await,
            Ok(Ok(_))
        );
        if !drained {
            let remaining = *self.inner.in_flight.borrow();
            warn!(remaining, ?drain_timeout, "shutdown drain timed out");
        }

        let removed = self.inner.lock_registry().drain();
        for descriptor in &removed {
            self.inner.retire(descriptor);
        }
        info!(cleared = removed.len(), drained, "dispatcher shut down");
        ShutdownReport {
            drained,
            cleared: removed.len(),
        }
    }

    fn lookup(&self, app_id: &str, name: &str) -> Result<Arc<TaskDescriptor>, TaskError> {
        let key = TaskKey::new(app_id, name);
        let registry = self.inner.lock_registry();
        registry.get(&key).cloned().ok_or(TaskError::NotFound(key))
    }
}

impl Inner {
    fn lock_registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_background(&self) -> MutexGuard<'_, ()> {
        self.background.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_open(&self) -> Result<(), TaskError> {
        if self.closing.load(Ordering::Acquire) {
            return Err(TaskError::ShuttingDown);
        }
        Ok(())
    }

    fn retire(&self, descriptor: &TaskDescriptor) {
        if !descriptor.retire() {
            return;
        }
        descriptor.notify_unregistered();
        {
            let _background = self.lock_background();
            let superseded = self
                .lock_registry()
                .get(descriptor.key())
                .is_some_and(|current| current.registration() != descriptor.registration());
            if superseded {
                debug!(
                    app_id = descriptor.app_id(),
                    task = descriptor.name(),
                    "key re-registered, leaving background registration in place"
                );
            } else {
                self.scheduler.unregister_from_background(descriptor);
            }
        }
        self.events.emit(DomainEvent::TaskUnregistered {
            key: descriptor.key().clone(),
            registration: descriptor.registration(),
        });
        info!(app_id = descriptor.app_id(), task = descriptor.name(), "task unregistered");
    }

    async fn run_firing(
        &self,
        firing: FiringId,
        descriptor: &TaskDescriptor,
        data: Option<Value>,
        error: Option<TaskFailure>,
    ) -> FiringReport {
        let key = descriptor.key().clone();
        let started_at = self.clock.now();
        self.counters.firing_started();
        self.events.emit(DomainEvent::FiringStarted {
            key: key.clone(),
            firing,
            at: started_at,
        });
        debug!("firing started");

        if self.config.relaunch_detached_apps
            && descriptor.is_registered()
            && descriptor.delegate().is_none()
        {
            match self.scheduler.request_relaunch(descriptor) {
                Ok(()) => info!(app_url = descriptor.app_url(), "no live delegate, relaunch requested"),
                Err(e) => warn!(app_url = descriptor.app_url(), error = %e, "relaunch request failed"),
            }
        }

        let (outcome, delivery) = descriptor.execute_with_data(data, error).await;
        let finished_at = self.clock.now();

        if outcome.error().is_some() {
            self.counters.execution_failed();
        }
        self.record_delivery(&key, firing, &outcome, delivery);
        self.events.emit(DomainEvent::FiringFinished {
            key: key.clone(),
            firing,
            success: outcome.is_success(),
            delivery,
            at: finished_at,
        });
        debug!(?delivery, success = outcome.is_success(), "firing finished");

        FiringReport {
            firing,
            key,
            outcome,
            delivery,
            started_at,
            finished_at,
        }
    }

    fn record_delivery(&self, key: &TaskKey, firing: FiringId, outcome: &Outcome, delivery: Delivery) {
        if delivery.is_delivered() {
            self.counters.outcome_delivered();
            return;
        }
        self.counters.outcome_dropped();
        self.events.emit(DomainEvent::OutcomeDropped {
            key: key.clone(),
            firing,
            delivery,
            error: outcome.error().cloned(),
        });
        match (delivery, outcome.error()) {
            (Delivery::DelegatePanicked, _) => error!("delegate panicked while being notified"),
            (Delivery::Unregistered, _) => debug!("task unregistered during execution, outcome dropped"),
            (_, Some(failure)) => warn!(
                code = %failure.code,
                message = %failure.message,
                "execution failed with no delegate listening"
            ),
            (_, None) => debug!("no delegate, outcome dropped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::MemoryEventSink;
    use crate::ports::SchedulerError;
    use crate::typed::ConsumerKind;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Echo {
        registered: AtomicUsize,
        options_updates: AtomicUsize,
    }

    #[async_trait]
    impl crate::ports::TaskConsumer for Echo {
        async fn execute(
            &self,
            _task: &TaskDescriptor,
            data: Option<Value>,
            _error: Option<TaskFailure>,
        ) -> Result<Option<Value>, TaskFailure> {
            Ok(data)
        }

        fn did_register(&self, _task: &TaskDescriptor) {
            self.registered.fetch_add(1, Ordering::SeqCst);
        }

        fn did_update_options(&self, task: &TaskDescriptor) {
            assert!(task.options().min_interval().is_some());
            self.options_updates.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl ConsumerKind for Echo {
        const KIND: &'static str = "test.echo.v1";
    }

    struct Refusing;

    impl BackgroundScheduler for Refusing {
        fn register_for_background(&self, _task: &TaskDescriptor) -> Result<(), SchedulerError> {
            Err(SchedulerError::Unavailable("background refresh disabled".into()))
        }

        fn unregister_from_background(&self, _task: &TaskDescriptor) {}

        fn request_relaunch(&self, _task: &TaskDescriptor) -> Result<(), SchedulerError> {
            Ok(())
        }
    }

    fn dispatcher() -> (TaskDispatcher, Arc<MemoryEventSink>) {
        let events = Arc::new(MemoryEventSink::new());
        let dispatcher = TaskDispatcher::builder()
            .consumer::<Echo>()
            .unwrap()
            .event_sink(events.clone())
            .build()
            .unwrap();
        (dispatcher, events)
    }

    fn echo(app_id: &str, name: &str) -> TaskRegistration {
        TaskRegistration::new(app_id, name, format!("app://{app_id}"), Echo::KIND)
    }

    #[test]
    fn register_emits_event_and_lists_task() {
        let (dispatcher, events) = dispatcher();
        let handle = dispatcher.register(echo("app1", "sync")).unwrap();

        assert_eq!(handle.key(), &TaskKey::new("app1", "sync"));
        assert_eq!(events.count("task_registered"), 1);
        assert_eq!(dispatcher.tasks_for_app("app1").len(), 1);
        assert!(dispatcher.tasks_for_app("app2").is_empty());
        assert_eq!(dispatcher.status().registered, 1);
    }

    #[test]
    fn unknown_kind_is_invalid_argument() {
        let (dispatcher, _) = dispatcher();
        let err = dispatcher
            .register(TaskRegistration::new("app1", "sync", "app://app1", "nope.v1"))
            .unwrap_err();
        assert!(matches!(err, TaskError::InvalidArgument(_)));
        assert!(!dispatcher.is_registered("app1", "sync"));
    }

    #[test]
    fn scheduler_rejection_rolls_back() {
        let dispatcher = TaskDispatcher::builder()
            .consumer::<Echo>()
            .unwrap()
            .scheduler(Arc::new(Refusing))
            .build()
            .unwrap();

        let err = dispatcher.register(echo("app1", "sync")).unwrap_err();
        assert!(matches!(err, TaskError::SchedulerRejected { .. }));
        assert!(!dispatcher.is_registered("app1", "sync"));
    }

    #[test]
    fn update_options_requires_registration() {
        let (dispatcher, events) = dispatcher();
        let options = TaskOptions::new().with("minInterval", json!(60));

        let err = dispatcher
            .update_options("app1", "sync", options.clone())
            .unwrap_err();
        assert_eq!(err, TaskError::NotFound(TaskKey::new("app1", "sync")));

        dispatcher.register(echo("app1", "sync")).unwrap();
        dispatcher.update_options("app1", "sync", options).unwrap();

        let task = dispatcher.get("app1", "sync").unwrap();
        assert_eq!(task.options().min_interval(), Some(std::time::Duration::from_secs(60)));
        assert_eq!(events.count("options_updated"), 1);
    }

    #[test]
    fn update_options_validates_before_lookup() {
        let (dispatcher, _) = dispatcher();
        dispatcher.register(echo("app1", "sync")).unwrap();
        let err = dispatcher
            .update_options("app1", "sync", TaskOptions::new().with("minInterval", json!("soon")))
            .unwrap_err();
        assert!(matches!(err, TaskError::InvalidArgument(_)));
    }

    #[test]
    fn unregister_is_idempotent() {
        let (dispatcher, events) = dispatcher();
        dispatcher.register(echo("app1", "sync")).unwrap();

        dispatcher.unregister("app1", "sync");
        dispatcher.unregister("app1", "sync");

        assert!(!dispatcher.is_registered("app1", "sync"));
        assert_eq!(events.count("task_unregistered"), 1);
    }

    #[test]
    fn unregister_app_removes_only_that_app() {
        let (dispatcher, _) = dispatcher();
        dispatcher.register(echo("app1", "a")).unwrap();
        dispatcher.register(echo("app1", "b")).unwrap();
        dispatcher.register(echo("app2", "a")).unwrap();

        assert_eq!(dispatcher.unregister_app("app1"), 2);
        assert!(dispatcher.is_registered("app2", "a"));
        assert_eq!(dispatcher.status().registered, 1);
    }

    #[tokio::test]
    async fn fire_without_delegate_records_drop() {
        let (dispatcher, events) = dispatcher();
        dispatcher.register(echo("app1", "sync")).unwrap();

        let report = dispatcher
            .fire("app1", "sync", Some(json!({"items": 3})), None)
            .unwrap()
            .wait()
            .await
            .unwrap();

        assert_eq!(report.delivery, Delivery::NoDelegate);
        assert_eq!(report.outcome.data(), Some(&json!({"items": 3})));
        assert_eq!(events.count("outcome_dropped"), 1);

        let status = dispatcher.status();
        assert_eq!(status.firings_started, 1);
        assert_eq!(status.outcomes_dropped, 1);
        assert_eq!(status.in_flight, 0);
    }

    #[tokio::test]
    async fn shutdown_clears_and_refuses_new_work() {
        let (dispatcher, _) = dispatcher();
        dispatcher.register(echo("app1", "sync")).unwrap();

        let report = dispatcher.shutdown().await;

        assert!(report.drained);
        assert_eq!(report.cleared, 1);
        assert!(dispatcher.is_shutting_down());
        assert_eq!(
            dispatcher.register(echo("app1", "other")).unwrap_err(),
            TaskError::ShuttingDown
        );
        assert!(matches!(
            dispatcher.fire("app1", "sync", None, None),
            Err(TaskError::ShuttingDown)
        ));
    }
}
