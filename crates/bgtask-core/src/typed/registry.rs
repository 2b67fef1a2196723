//! ConsumerRegistry - kind ごとの ConsumerFactory の登録と管理
//!
//! # 学習ポイント
//! - HashMap での型消去された trait object の管理
//! - Generic methods での登録と型安全性
//! - Arc による共有所有権

use std::collections::HashMap;
use std::sync::Arc;

use super::factory::{ConsumerFactory, FnFactory, TypedFactory};
use super::kind::ConsumerKind;
use crate::domain::TaskError;
use crate::ports::TaskConsumer;

/// ConsumerRegistry は kind → ConsumerFactory の表
///
/// # 使用例
/// ```ignore
/// let mut registry = ConsumerRegistry::new();
/// registry.register::<SyncConsumer>()?;
///
/// let consumer = registry.create(SyncConsumer::KIND)?;
/// ```
///
/// 構築時だけ可変で、ディスパッチャに渡した後は読み取り専用です（ロック不要）。
#[derive(Default)]
pub struct ConsumerRegistry {
    factories: HashMap<String, Arc<dyn ConsumerFactory>>,
}

/// RegistryError は ConsumerRegistry の操作エラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Consumer for kind '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("Consumer kind must not be empty")]
    EmptyKind,
}

impl ConsumerRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register<C: ConsumerKind>(&mut self) -> Result<(), RegistryError> {
        self.insert(Arc::new(TypedFactory::<C>::new()))
    }

    pub fn register_factory<F>(&mut self, kind: impl Into<String>, f: F) -> Result<(), RegistryError>
    where
        F: Fn() -> Result<Box<dyn TaskConsumer>, String> + Send + Sync + 'static,
    {
        self.insert(Arc::new(FnFactory::new(kind, f)))
    }

    pub fn insert(&mut self, factory: Arc<dyn ConsumerFactory>) -> Result<(), RegistryError> {
        let kind = factory.kind().to_string();
        if kind.trim().is_empty() {
            return Err(RegistryError::EmptyKind);
        }
        if self.factories.contains_key(&kind) {
            return Err(RegistryError::AlreadyRegistered(kind));
        }
        self.factories.insert(kind, factory);
        Ok(())
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Instantiates a fresh consumer. Unknown kinds and factory failures are `InvalidArgument`.
    pub fn create(&self, kind: &str) -> Result<Box<dyn TaskConsumer>, TaskError> {
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| TaskError::invalid(format!("unknown consumer kind '{kind}'")))?;
        factory.create().map_err(|reason| {
            TaskError::invalid(format!(
                "consumer kind '{kind}' could not be instantiated: {reason}"
            ))
        })
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.factories.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}
