//! TaskRegistration - 登録リクエスト / TaskHandle - 登録の控え

use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};

use super::errors::TaskError;
use super::ids::{RegistrationId, TaskKey};
use super::options::TaskOptions;
use crate::ports::TaskDelegate;

/// TaskRegistration は `register` に渡す入力
///
/// # 使用例
/// ```ignore
/// let registration = TaskRegistration::new("app1", "sync", "app://app1", SyncConsumer::KIND)
///     .with_options(TaskOptions::new().with("minInterval", json!(900)))
///     .with_delegate(&delegate);
/// let handle = dispatcher.register(registration)?;
/// ```
#[derive(Clone)]
pub struct TaskRegistration {
    pub(crate) app_id: String,
    pub(crate) name: String,
    pub(crate) app_url: String,
    pub(crate) consumer_kind: String,
    pub(crate) options: TaskOptions,
    pub(crate) delegate: Option<Weak<dyn TaskDelegate>>,
}

impl TaskRegistration {
    pub fn new(
        app_id: impl Into<String>,
        name: impl Into<String>,
        app_url: impl Into<String>,
        consumer_kind: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            name: name.into(),
            app_url: app_url.into(),
            consumer_kind: consumer_kind.into(),
            options: TaskOptions::new(),
            delegate: None,
        }
    }

    pub fn with_options(mut self, options: TaskOptions) -> Self {
        self.options = options;
        self
    }

    /// Delegate は弱参照で保持する（寿命を延ばさない）
    pub fn with_delegate<D: TaskDelegate + 'static>(mut self, delegate: &Arc<D>) -> Self {
        let weak: Weak<dyn TaskDelegate> = Arc::downgrade(delegate) as Weak<dyn TaskDelegate>;
        self.delegate = Some(weak);
        self
    }

    pub fn with_delegate_weak(mut self, delegate: Weak<dyn TaskDelegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    pub fn key(&self) -> TaskKey {
        TaskKey::new(self.app_id.clone(), self.name.clone())
    }

    pub fn consumer_kind(&self) -> &str {
        &self.consumer_kind
    }

    /// Rejects empty identity fields and malformed well-known options.
    pub fn validate(&self) -> Result<(), TaskError> {
        for (field, value) in [
            ("name", &self.name),
            ("app_id", &self.app_id),
            ("app_url", &self.app_url),
            ("consumer_kind", &self.consumer_kind),
        ] {
            if value.trim().is_empty() {
                return Err(TaskError::invalid(format!("{field} must not be empty")));
            }
        }
        self.options.validate()
    }
}

impl std::fmt::Debug for TaskRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistration")
            .field("app_id", &self.app_id)
            .field("name", &self.name)
            .field("app_url", &self.app_url)
            .field("consumer_kind", &self.consumer_kind)
            .field("options", &self.options)
            .field("has_delegate", &self.delegate.is_some())
            .finish()
    }
}

/// TaskHandle は登録成功時に返る控え
///
/// 同じキーで登録し直すと `registration` が変わるので、
/// 手元の handle が今の登録を指しているかを判定できます。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskHandle {
    key: TaskKey,
    registration: RegistrationId,
}

impl TaskHandle {
    pub(crate) fn new(key: TaskKey, registration: RegistrationId) -> Self {
        Self { key, registration }
    }

    pub fn key(&self) -> &TaskKey {
        &self.key
    }

    pub fn app_id(&self) -> &str {
        self.key.app_id()
    }

    pub fn name(&self) -> &str {
        self.key.name()
    }

    pub fn registration(&self) -> RegistrationId {
        self.registration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case::empty_name("app1", "", "app://app1")]
    #[case::empty_app_id("", "sync", "app://app1")]
    #[case::blank_app_url("app1", "sync", "   ")]
    fn empty_identity_fields_are_invalid(
        #[case] app_id: &str,
        #[case] name: &str,
        #[case] app_url: &str,
    ) {
        let registration = TaskRegistration::new(app_id, name, app_url, "demo.v1");
        assert!(matches!(
            registration.validate(),
            Err(TaskError::InvalidArgument(_))
        ));
    }

    #[test]
    fn malformed_options_are_invalid() {
        let registration = TaskRegistration::new("app1", "sync", "app://app1", "demo.v1")
            .with_options(TaskOptions::new().with("minInterval", json!(-5)));
        assert!(registration.validate().is_err());
    }

    #[test]
    fn valid_registration_builds_key() {
        let registration = TaskRegistration::new("app1", "sync", "app://app1", "demo.v1");
        assert!(registration.validate().is_ok());
        assert_eq!(registration.key(), TaskKey::new("app1", "sync"));
    }
}
