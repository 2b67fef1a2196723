//! DispatcherConfig - ディスパッチャの設定
//!
//! JSON（`drain_timeout_ms` はミリ秒）または環境変数から読み込めます。
//!
//! | 環境変数                   | フィールド               |
//! |----------------------------|--------------------------|
//! | `BGTASK_DRAIN_TIMEOUT_MS`  | `drain_timeout`          |
//! | `BGTASK_RELAUNCH_DETACHED` | `relaunch_detached_apps` |

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const ENV_DRAIN_TIMEOUT_MS: &str = "BGTASK_DRAIN_TIMEOUT_MS";
pub const ENV_RELAUNCH_DETACHED: &str = "BGTASK_RELAUNCH_DETACHED";

const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// How long `shutdown` waits for in-flight firings before clearing the registry.
    #[serde(rename = "drain_timeout_ms", with = "duration_ms")]
    pub drain_timeout: Duration,

    /// Ask the scheduler to relaunch the app when a firing finds no live delegate.
    pub relaunch_detached_apps: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("config json: {0}")]
    Json(#[from] serde_json::Error),
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            relaunch_detached_apps: false,
        }
    }
}

impl DispatcherConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`. Unset keys keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_DRAIN_TIMEOUT_MS) {
            let ms = value
                .trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::InvalidValue {
                    key: ENV_DRAIN_TIMEOUT_MS,
                    value: value.clone(),
                    reason: e.to_string(),
                })?;
            config.drain_timeout = Duration::from_millis(ms);
        }

        if let Some(value) = lookup(ENV_RELAUNCH_DETACHED) {
            config.relaunch_detached_apps = parse_bool(&value).ok_or_else(|| {
                ConfigError::InvalidValue {
                    key: ENV_RELAUNCH_DETACHED,
                    value: value.clone(),
                    reason: "expected true/false/1/0".to_string(),
                }
            })?;
        }

        Ok(config)
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn with_relaunch_detached_apps(mut self, enabled: bool) -> Self {
        self.relaunch_detached_apps = enabled;
        self
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = DispatcherConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, DispatcherConfig::default());
        assert_eq!(config.drain_timeout, Duration::from_secs(30));
        assert!(!config.relaunch_detached_apps);
    }

    #[rstest]
    #[case("true", true)]
    #[case("1", true)]
    #[case("OFF", false)]
    fn reads_env_values(#[case] relaunch: &str, #[case] expected: bool) {
        let config = DispatcherConfig::from_lookup(lookup(&[
            (ENV_DRAIN_TIMEOUT_MS, "1500"),
            (ENV_RELAUNCH_DETACHED, relaunch),
        ]))
        .unwrap();
        assert_eq!(config.drain_timeout, Duration::from_millis(1500));
        assert_eq!(config.relaunch_detached_apps, expected);
    }

    #[test]
    fn rejects_bad_env_values() {
        let err = DispatcherConfig::from_lookup(lookup(&[(ENV_DRAIN_TIMEOUT_MS, "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_DRAIN_TIMEOUT_MS));

        let err = DispatcherConfig::from_lookup(lookup(&[(ENV_RELAUNCH_DETACHED, "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == ENV_RELAUNCH_DETACHED));
    }

    #[test]
    fn json_uses_milliseconds_and_defaults_missing_fields() {
        let config = DispatcherConfig::from_json_str(r#"{"drain_timeout_ms": 250}"#).unwrap();
        assert_eq!(config.drain_timeout, Duration::from_millis(250));
        assert!(!config.relaunch_detached_apps);

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["drain_timeout_ms"], 250);
    }
}
