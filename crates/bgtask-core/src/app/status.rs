//! Status - ディスパッチャの状態スナップショット

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherStatus {
    pub registered: usize,
    pub in_flight: usize,
    pub firings_started: u64,
    pub outcomes_delivered: u64,
    pub outcomes_dropped: u64,
    pub executions_failed: u64,
}

/// Result of `TaskDispatcher::shutdown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownReport {
    /// All in-flight firings finished within the drain timeout.
    pub drained: bool,
    /// Number of tasks removed from the registry.
    pub cleared: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    firings_started: AtomicU64,
    outcomes_delivered: AtomicU64,
    outcomes_dropped: AtomicU64,
    executions_failed: AtomicU64,
}

impl Counters {
    pub(crate) fn firing_started(&self) {
        self.firings_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn outcome_delivered(&self) {
        self.outcomes_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn outcome_dropped(&self) {
        self.outcomes_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn execution_failed(&self) {
        self.executions_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn status(&self, registered: usize, in_flight: usize) -> DispatcherStatus {
        DispatcherStatus {
            registered,
            in_flight,
            firings_started: self.firings_started.load(Ordering::Relaxed),
            outcomes_delivered: self.outcomes_delivered.load(Ordering::Relaxed),
            outcomes_dropped: self.outcomes_dropped.load(Ordering::Relaxed),
            executions_failed: self.executions_failed.load(Ordering::Relaxed),
        }
    }
}
