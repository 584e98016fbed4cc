use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rc_types::model::{DelegationStatus, SafetySnapshot};
use rc_types::provider::{ProviderRequest, ProviderResult};

/// Input to `Archive::start_run`. A run is created `Queued` and carries no
/// result or events until the router begins projecting them.
#[derive(Debug, Clone)]
pub struct StartRunInput {
    pub run_id: String,
    pub request: ProviderRequest,
    pub conversation_id: Option<String>,
    pub metadata: HashMap<String, String>,
    pub trace_id: Option<String>,
    pub safety: Option<SafetySnapshot>,
}

/// Input to `Archive::record_event`. `sequence` is `None` for callers that
/// want the archive to assign the next sequence number itself (used by
/// synthetic rollback markers); the router always supplies its own.
#[derive(Debug, Clone)]
pub struct RecordEventInput {
    pub run_id: String,
    pub sequence: Option<u64>,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

/// What a rollback truncates the timeline back to.
#[derive(Debug, Clone)]
pub enum RollbackTarget {
    Sequence(u64),
    ToolCallId(String),
}

/// A single safety-state change recorded against a run. Kept as a closed
/// enum rather than a free-form mutation callback so every backend can
/// persist it the same way.
#[derive(Debug, Clone)]
pub enum SafetyUpdate {
    RecordRefusal { at: DateTime<Utc> },
    SetIdentifier { hashed_identifier: String },
}

#[derive(Debug, Clone)]
pub struct DelegationUpdate {
    pub call_id: String,
    pub status: DelegationStatus,
    pub output: Option<serde_json::Value>,
    pub completed_at: Option<DateTime<Utc>>,
}
