use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tool call requested by the model during a run. Transitions
/// `requested -> (completed | failed)` at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelegationStatus {
    Requested,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationRecord {
    pub call_id: String,
    pub tool_name: String,
    pub requested_at: DateTime<Utc>,
    pub status: DelegationStatus,
    #[serde(default)]
    pub arguments: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl DelegationRecord {
    pub fn requested(
        call_id: String,
        tool_name: String,
        arguments: serde_json::Value,
        requested_at: DateTime<Utc>,
    ) -> Self {
        Self {
            call_id,
            tool_name,
            requested_at,
            status: DelegationStatus::Requested,
            arguments,
            output: None,
            completed_at: None,
        }
    }
}
