use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(30_000);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackConfig {
    /// Upper bound on how long a blocked poll waits before it re-checks the
    /// connection and the blocking conditions. Zero means no periodic
    /// re-check.
    #[serde(rename = "checkIntervalMs", with = "duration_ms", default = "default_check_interval")]
    pub check_interval: Duration,
}

impl CallbackConfig {
    pub fn with_check_interval(check_interval: Duration) -> Self {
        Self { check_interval }
    }
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }
}

fn default_check_interval() -> Duration {
    DEFAULT_CHECK_INTERVAL
}

pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn default_interval_is_thirty_seconds() {
        assert_eq!(CallbackConfig::default().check_interval, Duration::from_secs(30));
    }

    #[test]
    fn interval_is_expressed_in_millis() {
        let config = CallbackConfig::with_check_interval(Duration::from_millis(250));
        assert_eq!(
            serde_json::to_value(&config).expect("serialize"),
            json!({ "checkIntervalMs": 250 })
        );

        let parsed: CallbackConfig = serde_json::from_value(json!({})).expect("deserialize");
        assert_eq!(parsed, CallbackConfig::default());
    }
}
