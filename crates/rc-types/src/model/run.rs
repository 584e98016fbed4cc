use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::safety::SafetySnapshot;
use crate::model::delegation::DelegationRecord;
use crate::provider::{ProviderRequest, ProviderResult};

/// Lifecycle state of a run, projected by the Event Router from the
/// provider's event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    Incomplete,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Incomplete
        )
    }
}

/// A single model-invocation run with its full event timeline.
///
/// Owned exclusively by the Archive; mutated only through router-driven
/// status updates, safety updates, moderator notes, or rollback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub request: ProviderRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ProviderResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety: Option<SafetySnapshot>,
    #[serde(default)]
    pub delegations: Vec<DelegationRecord>,
}

impl RunRecord {
    pub fn new(
        run_id: String,
        request: ProviderRequest,
        conversation_id: Option<String>,
        metadata: HashMap<String, String>,
        trace_id: Option<String>,
        safety: Option<SafetySnapshot>,
    ) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            request,
            conversation_id,
            metadata,
            status: RunStatus::Queued,
            created_at: now,
            updated_at: now,
            trace_id,
            result: None,
            safety,
            delegations: Vec::new(),
        }
    }

    /// Tenant id, read from the `tenant_id` metadata key (the other
    /// recognized key per spec.md §3 is `region`).
    pub fn tenant_id(&self) -> Option<&str> {
        self.metadata.get("tenant_id").map(|s| s.as_str())
    }
}

/// Lightweight summary used by list endpoints and retry responses, so a
/// full event timeline is never serialized where only identity/status is
/// needed.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tenant_id: Option<String>,
}

impl From<&RunRecord> for RunSummary {
    fn from(run: &RunRecord) -> Self {
        Self {
            run_id: run.run_id.clone(),
            status: run.status,
            created_at: run.created_at,
            updated_at: run.updated_at,
            tenant_id: run.tenant_id().map(|s| s.to_string()),
        }
    }
}
