//! TaskOptions - タスクごとの設定（文字列キー → 任意の JSON 値）
//!
//! 値の中身はコアでは解釈しません（スケジューラや Consumer のもの）。
//! ただし、よく使われるキーだけは型付きアクセサと検証を用意しています。

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::TaskError;

/// Minimum interval between firings, in seconds.
pub const MIN_INTERVAL: &str = "minInterval";
/// Whether the task should stop when the application terminates.
pub const STOP_ON_TERMINATE: &str = "stopOnTerminate";
/// Whether the task should be scheduled again after a device reboot.
pub const START_ON_BOOT: &str = "startOnBoot";

/// TaskOptions は登録中に差し替え可能な設定
///
/// # 使用例
/// ```ignore
/// let options = TaskOptions::new().with("minInterval", json!(900));
/// assert_eq!(options.min_interval(), Some(Duration::from_secs(900)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskOptions(Map<String, Value>);

impl TaskOptions {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn min_interval(&self) -> Option<Duration> {
        let secs = self.0.get(MIN_INTERVAL)?.as_f64()?;
        Duration::try_from_secs_f64(secs).ok()
    }

    pub fn stop_on_terminate(&self) -> Option<bool> {
        self.0.get(STOP_ON_TERMINATE)?.as_bool()
    }

    pub fn start_on_boot(&self) -> Option<bool> {
        self.0.get(START_ON_BOOT)?.as_bool()
    }

    /// Checks the well-known keys. Unknown keys are left alone.
    pub fn validate(&self) -> Result<(), TaskError> {
        if let Some(value) = self.0.get(MIN_INTERVAL) {
            let valid = value
                .as_f64()
                .is_some_and(|s| Duration::try_from_secs_f64(s).is_ok());
            if !valid {
                return Err(TaskError::invalid(format!(
                    "option '{MIN_INTERVAL}' must be a non-negative number of seconds, got {value}"
                )));
            }
        }
        for key in [STOP_ON_TERMINATE, START_ON_BOOT] {
            if let Some(value) = self.0.get(key)
                && !value.is_boolean()
            {
                return Err(TaskError::invalid(format!(
                    "option '{key}' must be a boolean, got {value}"
                )));
            }
        }
        Ok(())
    }
}

impl From<Map<String, Value>> for TaskOptions {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for TaskOptions {
    type Error = TaskError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::new()),
            other => Err(TaskError::invalid(format!(
                "options must be a JSON object, got {other}"
            ))),
        }
    }
}
