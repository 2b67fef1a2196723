//! Events - ドメインイベント
//!
//! EventSink に流すイベントです。ログ（tracing）とは別に、
//! 「何が起きたか」を構造化して記録したい場合に使います。
//! Delegate がいないために捨てられた失敗も `OutcomeDropped` として残ります。

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ids::{FiringId, RegistrationId, TaskKey};
use super::outcome::{Delivery, TaskFailure};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    TaskRegistered {
        key: TaskKey,
        registration: RegistrationId,
        consumer_kind: String,
    },
    TaskUnregistered {
        key: TaskKey,
        registration: RegistrationId,
    },
    OptionsUpdated {
        key: TaskKey,
    },
    FiringStarted {
        key: TaskKey,
        firing: FiringId,
        at: DateTime<Utc>,
    },
    FiringFinished {
        key: TaskKey,
        firing: FiringId,
        success: bool,
        delivery: Delivery,
        at: DateTime<Utc>,
    },
    OutcomeDropped {
        key: TaskKey,
        firing: FiringId,
        delivery: Delivery,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<TaskFailure>,
    },
}

impl DomainEvent {
    pub fn key(&self) -> &TaskKey {
        match self {
            Self::TaskRegistered { key, .. }
            | Self::TaskUnregistered { key, .. }
            | Self::OptionsUpdated { key }
            | Self::FiringStarted { key, .. }
            | Self::FiringFinished { key, .. }
            | Self::OutcomeDropped { key, .. } => key,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::TaskRegistered { .. } => "task_registered",
            Self::TaskUnregistered { .. } => "task_unregistered",
            Self::OptionsUpdated { .. } => "options_updated",
            Self::FiringStarted { .. } => "firing_started",
            Self::FiringFinished { .. } => "firing_finished",
            Self::OutcomeDropped { .. } => "outcome_dropped",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_tag_matches_name() {
        let event = DomainEvent::OptionsUpdated {
            key: TaskKey::new("app1", "sync"),
        };
        let v = serde_json::to_value(&event).unwrap();
        assert_eq!(v["event"], event.name());
        assert_eq!(v["key"]["app_id"], "app1");
        assert_eq!(event.key().name(), "sync");
    }
}
