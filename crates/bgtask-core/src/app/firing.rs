//! Firing - 受け付けた発火 1 件のハンドル

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::domain::{Delivery, FiringId, Outcome, TaskKey};

/// What one firing did, available once it has finished.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FiringReport {
    pub firing: FiringId,
    pub key: TaskKey,
    pub outcome: Outcome,
    pub delivery: Delivery,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Handle returned by `TaskDispatcher::fire`.
///
/// Dropping it does not cancel the firing.
#[derive(Debug)]
pub struct Firing {
    id: FiringId,
    key: TaskKey,
    handle: JoinHandle<FiringReport>,
}

impl Firing {
    pub(crate) fn new(id: FiringId, key: TaskKey, handle: JoinHandle<FiringReport>) -> Self {
        Self { id, key, handle }
    }

    pub fn id(&self) -> FiringId {
        self.id
    }

    pub fn key(&self) -> &TaskKey {
        &self.key
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the firing to finish. `None` only if the runtime cancelled it.
    pub async fn wait(self) -> Option<FiringReport> {
        match self.handle.await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::warn!(firing = %self.id, task = %self.key, error = %e, "firing did not complete");
                None
            }
        }
    }
}
