//! TaskDescriptor - 登録済みタスク 1 件分の実体
//!
//! # 所有関係
//! - Consumer は登録時に 1 回だけ生成され、Descriptor が単独で所有する
//! - Delegate は弱参照。通知のたびに upgrade し、失敗したら「Delegate なし」扱い
//! - `registered` フラグは unregister で落ちる。実行中の発火は最後まで走るが、
//!   結果は Delegate に届けない

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;

use super::errors::TaskError;
use super::ids::{RegistrationId, TaskKey};
use super::options::TaskOptions;
use super::outcome::{Delivery, Outcome, TaskFailure};
use super::registration::TaskRegistration;
use crate::ports::{TaskConsumer, TaskDelegate};
use crate::typed::ConsumerRegistry;

pub struct TaskDescriptor {
    key: TaskKey,
    app_url: String,
    consumer_kind: String,
    registration: RegistrationId,
    consumer: Box<dyn TaskConsumer>,
    options: RwLock<TaskOptions>,
    delegate: RwLock<Option<Weak<dyn TaskDelegate>>>,
    registered: AtomicBool,
}

/// Serializable view of a descriptor (for listing and status output).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSnapshot {
    pub key: TaskKey,
    pub app_url: String,
    pub consumer_kind: String,
    pub registration: RegistrationId,
    pub options: TaskOptions,
    pub has_delegate: bool,
}

impl TaskDescriptor {
    /// Builds a descriptor around an already constructed consumer.
    pub fn new(
        registration_id: RegistrationId,
        registration: TaskRegistration,
        consumer: Box<dyn TaskConsumer>,
    ) -> Result<Self, TaskError> {
        registration.validate()?;
        let key = registration.key();
        let TaskRegistration {
            app_url,
            consumer_kind,
            options,
            delegate,
            ..
        } = registration;
        Ok(Self {
            key,
            app_url,
            consumer_kind,
            registration: registration_id,
            consumer,
            options: RwLock::new(options),
            delegate: RwLock::new(delegate),
            registered: AtomicBool::new(true),
        })
    }

    /// Instantiates the consumer for `registration.consumer_kind` and builds a descriptor.
    pub fn from_kind(
        registration_id: RegistrationId,
        registration: TaskRegistration,
        consumers: &ConsumerRegistry,
    ) -> Result<Self, TaskError> {
        registration.validate()?;
        let consumer = consumers.create(registration.consumer_kind())?;
        Self::new(registration_id, registration, consumer)
    }

    pub fn key(&self) -> &TaskKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        self.key.name()
    }

    pub fn app_id(&self) -> &str {
        self.key.app_id()
    }

    pub fn app_url(&self) -> &str {
        &self.app_url
    }

    pub fn consumer_kind(&self) -> &str {
        &self.consumer_kind
    }

    pub fn registration(&self) -> RegistrationId {
        self.registration
    }

    pub fn options(&self) -> TaskOptions {
        self.options
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Callers validate first; `TaskDispatcher::update_options` is the public path.
    pub(crate) fn set_options(&self, options: TaskOptions) {
        *self.options.write().unwrap_or_else(PoisonError::into_inner) = options;
    }

    /// Resolves the weak delegate. `None` if unset or already dropped.
    pub fn delegate(&self) -> Option<Arc<dyn TaskDelegate>> {
        self.delegate
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }

    /// Holds `delegate` weakly. For an `Arc<dyn TaskDelegate>`, pass
    /// `Arc::downgrade(&delegate)` to `set_delegate_weak`.
    pub fn set_delegate<D: TaskDelegate + 'static>(&self, delegate: &Arc<D>) {
        let weak: Weak<dyn TaskDelegate> = Arc::downgrade(delegate) as Weak<dyn TaskDelegate>;
        self.set_delegate_weak(Some(weak));
    }

    pub fn set_delegate_weak(&self, delegate: Option<Weak<dyn TaskDelegate>>) {
        *self.delegate.write().unwrap_or_else(PoisonError::into_inner) = delegate;
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    pub(crate) fn retire(&self) -> bool {
        self.registered.swap(false, Ordering::AcqRel)
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            key: self.key.clone(),
            app_url: self.app_url.clone(),
            consumer_kind: self.consumer_kind.clone(),
            registration: self.registration,
            options: self.options(),
            has_delegate: self.delegate().is_some(),
        }
    }

    pub(crate) fn notify_registered(&self) {
        self.consumer.did_register(self);
    }

    pub(crate) fn notify_unregistered(&self) {
        self.consumer.did_unregister(self);
    }

    pub(crate) fn notify_options_updated(&self) {
        self.consumer.did_update_options(self);
    }

    /// Runs the consumer once, then forwards the outcome to the delegate.
    ///
    /// A consumer error or panic becomes `Outcome::Failed`; nothing is raised
    /// to the caller. Delivery is skipped (not an error) when the delegate is
    /// gone or the task was unregistered while the consumer ran.
    pub async fn execute_with_data(
        &self,
        data: Option<Value>,
        error: Option<TaskFailure>,
    ) -> (Outcome, Delivery) {
        let outcome = self.run_consumer(data, error).await;
        let delivery = self.forward(&outcome);
        (outcome, delivery)
    }

    async fn run_consumer(&self, data: Option<Value>, error: Option<TaskFailure>) -> Outcome {
        let execution = AssertUnwindSafe(self.consumer.execute(self, data, error))
            .catch_unwind()
            .await;
        match execution {
            Ok(Ok(data)) => Outcome::success(data),
            Ok(Err(failure)) => Outcome::failed(failure),
            Err(panic) => Outcome::failed(TaskFailure::execution_failed(format!(
                "consumer panicked: {}",
                panic_message(panic.as_ref())
            ))),
        }
    }

    fn forward(&self, outcome: &Outcome) -> Delivery {
        if !self.is_registered() {
            return Delivery::Unregistered;
        }
        let Some(delegate) = self.delegate() else {
            return Delivery::NoDelegate;
        };
        match std::panic::catch_unwind(AssertUnwindSafe(|| delegate.notify(self, outcome))) {
            Ok(()) => Delivery::Delivered,
            Err(_) => Delivery::DelegatePanicked,
        }
    }
}

impl std::fmt::Debug for TaskDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskDescriptor")
            .field("key", &self.key)
            .field("app_url", &self.app_url)
            .field("consumer_kind", &self.consumer_kind)
            .field("registration", &self.registration)
            .field("registered", &self.is_registered())
            .finish()
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
