//! Typed - 型付き Consumer API
//!
//! consumer_kind の typo を型で排除し、kind と Consumer 型の対応を静的に保証します。
//!
//! # 二層構造
//! - **表層（Typed）**: `ConsumerKind` trait - `const KIND` で kind を宣言
//! - **内部（Dyn）**: `ConsumerFactory` trait - object-safe, type erasure

pub mod kind;
pub mod factory;
pub mod registry;

pub use self::kind::ConsumerKind;
pub use self::factory::{ConsumerFactory, FnFactory, TypedFactory};
pub use self::registry::{ConsumerRegistry, RegistryError};
