//! 登録済みタスクの表と、キーごとの実行ゲート
//!
//! ゲートは同じキーの発火を直列化する async Mutex です。
//! Descriptor とは別に持つので、実行中に登録し直しても同じゲートを共有します。

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;

use crate::domain::{TaskDescriptor, TaskError, TaskKey};

pub(crate) type Gate = Arc<AsyncMutex<()>>;

#[derive(Default)]
pub(crate) struct Registry {
    tasks: HashMap<TaskKey, Arc<TaskDescriptor>>,
    gates: HashMap<TaskKey, Gate>,
}

impl Registry {
    pub(crate) fn get(&self, key: &TaskKey) -> Option<&Arc<TaskDescriptor>> {
        self.tasks.get(key)
    }

    pub(crate) fn contains(&self, key: &TaskKey) -> bool {
        self.tasks.contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    pub(crate) fn insert(&mut self, descriptor: Arc<TaskDescriptor>) -> Result<(), TaskError> {
        match self.tasks.entry(descriptor.key().clone()) {
            Entry::Occupied(entry) => Err(TaskError::DuplicateName(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(descriptor);
                Ok(())
            }
        }
    }

    pub(crate) fn remove(&mut self, key: &TaskKey) -> Option<Arc<TaskDescriptor>> {
        let removed = self.tasks.remove(key);
        self.prune_gate(key);
        removed
    }

    /// Removes `key` only if it still maps to this exact descriptor.
    pub(crate) fn remove_exact(&mut self, descriptor: &Arc<TaskDescriptor>) -> bool {
        let key = descriptor.key();
        let same = self
            .tasks
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, descriptor));
        if same {
            self.remove(key);
        }
        same
    }

    pub(crate) fn remove_app(&mut self, app_id: &str) -> Vec<Arc<TaskDescriptor>> {
        let keys: Vec<TaskKey> = self
            .tasks
            .keys()
            .filter(|k| k.app_id() == app_id)
            .cloned()
            .collect();
        keys.iter().filter_map(|k| self.remove(k)).collect()
    }

    pub(crate) fn drain(&mut self) -> Vec<Arc<TaskDescriptor>> {
        let removed: Vec<_> = self.tasks.drain().map(|(_, d)| d).collect();
        self.gates.retain(|_, gate| Arc::strong_count(gate) > 1);
        removed
    }

    pub(crate) fn for_app(&self, app_id: &str) -> Vec<Arc<TaskDescriptor>> {
        let mut tasks: Vec<_> = self
            .tasks
            .values()
            .filter(|d| d.app_id() == app_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.name().cmp(b.name()));
        tasks
    }

    pub(crate) fn gate(&mut self, key: &TaskKey) -> Gate {
        Arc::clone(self.gates.entry(key.clone()).or_default())
    }

    /// Drops the gate for an unregistered key once nobody holds or waits on it.
    pub(crate) fn prune_gate(&mut self, key: &TaskKey) {
        if self.tasks.contains_key(key) {
            return;
        }
        if let Some(gate) = self.gates.get(key)
            && Arc::strong_count(gate) == 1
        {
            self.gates.remove(key);
        }
    }

    #[cfg(test)]
    pub(crate) fn gate_count(&self) -> usize {
        self.gates.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RegistrationId, TaskFailure, TaskRegistration};
    use crate::ports::TaskConsumer;
    use async_trait::async_trait;
    use serde_json::Value;
    use ulid::Ulid;

    struct Idle;

    #[async_trait]
    impl TaskConsumer for Idle {
        async fn execute(
            &self,
            _task: &TaskDescriptor,
            _data: Option<Value>,
            _error: Option<TaskFailure>,
        ) -> Result<Option<Value>, TaskFailure> {
            Ok(None)
        }
    }

    fn descriptor(app_id: &str, name: &str) -> Arc<TaskDescriptor> {
        let registration = TaskRegistration::new(app_id, name, "app://x", "test.idle.v1");
        Arc::new(
            TaskDescriptor::new(RegistrationId::from_ulid(Ulid::new()), registration, Box::new(Idle))
                .unwrap(),
        )
    }

    #[test]
    fn insert_rejects_duplicates() {
        let mut registry = Registry::default();
        registry.insert(descriptor("app1", "sync")).unwrap();
        let err = registry.insert(descriptor("app1", "sync")).unwrap_err();
        assert_eq!(err, TaskError::DuplicateName(TaskKey::new("app1", "sync")));
    }

    #[test]
    fn remove_exact_ignores_newer_registration() {
        let mut registry = Registry::default();
        let old = descriptor("app1", "sync");
        registry.insert(Arc::clone(&old)).unwrap();
        registry.remove(old.key());
        registry.insert(descriptor("app1", "sync")).unwrap();

        assert!(!registry.remove_exact(&old));
        assert!(registry.contains(old.key()));
    }

    #[test]
    fn gate_survives_while_held() {
        let mut registry = Registry::default();
        let key = TaskKey::new("app1", "sync");
        registry.insert(descriptor("app1", "sync")).unwrap();

        let held = registry.gate(&key);
        registry.remove(&key);
        assert_eq!(registry.gate_count(), 1);

        drop(held);
        registry.prune_gate(&key);
        assert_eq!(registry.gate_count(), 0);
    }

    #[test]
    fn remove_app_only_touches_that_app() {
        let mut registry = Registry::default();
        registry.insert(descriptor("app1", "a")).unwrap();
        registry.insert(descriptor("app1", "b")).unwrap();
        registry.insert(descriptor("app2", "a")).unwrap();

        let removed = registry.remove_app("app1");
        assert_eq!(removed.len(), 2);
        assert_eq!(registry.len(), 1);
        assert!(registry.for_app("app1").is_empty());
        assert_eq!(registry.for_app("app2").len(), 1);
    }
}
