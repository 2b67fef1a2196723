//! Domain identifiers.
//!
//! # キー
//! タスクは `(app_id, name)` の組 [`TaskKey`] で一意に識別されます。
//! 同じ名前でも app_id が異なれば別のタスクです。
//!
//! # ULID ベースの ID
//! 登録 (registration) と発火 (firing) には ULID を使った型付き ID を振ります。
//! `Id<T>` は Phantom type パターンで、`RegistrationId` と `FiringId` を
//! コンパイル時に区別します。
//!
//! ## ULID の特性
//! - **時刻でソート可能**: ログを ID 順に並べれば発生順になる
//! - **分散生成可能**: 調整なしで生成できる

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// TaskKey はレジストリのキー（app_id + name）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskKey {
    app_id: String,
    name: String,
}

impl TaskKey {
    pub fn new(app_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            name: name.into(),
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.app_id, self.name)
    }
}

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"reg-", "fire-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// `T` は PhantomData なので実行時のサイズは Ulid と同じです。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Registration のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Registration {}

impl IdMarker for Registration {
    fn prefix() -> &'static str {
        "reg-"
    }
}

/// Firing のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Firing {}

impl IdMarker for Firing {
    fn prefix() -> &'static str {
        "fire-"
    }
}

/// Identifier of one registration of a task (changes on re-registration).
pub type RegistrationId = Id<Registration>;

/// Identifier of one firing (one consumer execution).
pub type FiringId = Id<Firing>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_key_displays_app_and_name() {
        let key = TaskKey::new("app1", "sync");
        assert_eq!(key.to_string(), "app1/sync");
        assert_eq!(key.app_id(), "app1");
        assert_eq!(key.name(), "sync");
    }

    #[test]
    fn same_name_in_different_apps_are_different_keys() {
        assert_ne!(TaskKey::new("app1", "sync"), TaskKey::new("app2", "sync"));
    }

    #[test]
    fn ids_have_distinct_prefixes() {
        let reg = RegistrationId::from_ulid(Ulid::new());
        let fire = FiringId::from_ulid(Ulid::new());

        assert!(reg.to_string().starts_with("reg-"));
        assert!(fire.to_string().starts_with("fire-"));

        // let _: RegistrationId = fire; // <- does not compile
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;
        assert_eq!(size_of::<RegistrationId>(), size_of::<Ulid>());
        assert_eq!(size_of::<FiringId>(), size_of::<Ulid>());
    }
}
