//! ConsumerFactory - kind から Consumer を生成する
//!
//! # 学習ポイント
//! - Object-safe trait (ConsumerFactory)
//! - Type erasure パターン (TypedFactory<C> → dyn ConsumerFactory)
//! - クロージャによる生成 (FnFactory)

use std::marker::PhantomData;

use super::kind::ConsumerKind;
use crate::ports::TaskConsumer;

/// ConsumerFactory は object-safe な生成器
///
/// `HashMap<String, Arc<dyn ConsumerFactory>>` に格納できます。
pub trait ConsumerFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn TaskConsumer>, String>;

    fn kind(&self) -> &str;
}

/// ConsumerKind を実装した型を `Default` で生成する
pub struct TypedFactory<C: ConsumerKind> {
    _marker: PhantomData<fn() -> C>,
}

impl<C: ConsumerKind> TypedFactory<C> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<C: ConsumerKind> Default for TypedFactory<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ConsumerKind> ConsumerFactory for TypedFactory<C> {
    fn create(&self) -> Result<Box<dyn TaskConsumer>, String> {
        Ok(Box::new(C::default()))
    }

    fn kind(&self) -> &str {
        C::KIND
    }
}

/// クロージャで Consumer を生成する（設定を捕まえたい場合など）
pub struct FnFactory<F> {
    kind: String,
    f: F,
}

impl<F> FnFactory<F>
where
    F: Fn() -> Result<Box<dyn TaskConsumer>, String> + Send + Sync,
{
    pub fn new(kind: impl Into<String>, f: F) -> Self {
        Self {
            kind: kind.into(),
            f,
        }
    }
}

impl<F> ConsumerFactory for FnFactory<F>
where
    F: Fn() -> Result<Box<dyn TaskConsumer>, String> + Send + Sync,
{
    fn create(&self) -> Result<Box<dyn TaskConsumer>, String> {
        (self.f)()
    }

    fn kind(&self) -> &str {
        &self.kind
    }
}
