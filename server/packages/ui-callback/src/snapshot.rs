use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::duration_ms;

/// Durable part of a coordinator, used to carry a session across a restart.
///
/// Blocked requests, the pending wake flag and whether a worker is running are
/// not part of it: they belong to connections and worker runs that do not
/// survive the restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorSnapshot {
    pub activations: Vec<String>,
    pub has_pending_work: bool,
    #[serde(rename = "checkIntervalMs", with = "duration_ms")]
    pub check_interval: Duration,
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to encode coordinator snapshot: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("invalid coordinator snapshot: {0}")]
    Decode(#[source] serde_json::Error),
}

impl CoordinatorSnapshot {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string(self).map_err(SnapshotError::Encode)
    }

    pub fn from_json(raw: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(raw).map_err(SnapshotError::Decode)
    }
}
