use chrono::Utc;
use rc_types::model::{EventRecord, RunStatus};
use rc_types::{Error, Result};

use crate::types::RollbackTarget;

/// Resolves a rollback target to the last sequence number that should
/// survive truncation.
pub(crate) fn resolve_cutoff(events: &[EventRecord], target: &RollbackTarget) -> Result<u64> {
    match target {
        RollbackTarget::Sequence(seq) => {
            if !events.iter().any(|e| e.sequence == *seq) {
                return Err(Error::InvalidRequest(format!(
                    "no event at sequence {seq}"
                )));
            }
            Ok(*seq)
        }
        RollbackTarget::ToolCallId(call_id) => events
            .iter()
            .find(|e| {
                e.payload
                    .get("call_id")
                    .and_then(|v| v.as_str())
                    .map(|v| v == call_id)
                    .unwrap_or(false)
            })
            .map(|e| e.sequence)
            .ok_or_else(|| Error::InvalidRequest(format!("no event for tool call {call_id}"))),
    }
}

pub(crate) fn build_marker(
    run_id: &str,
    sequence: u64,
    operator: &Option<String>,
    reason: &Option<String>,
) -> EventRecord {
    EventRecord {
        run_id: run_id.to_string(),
        sequence,
        event_type: "responses.rollback".to_string(),
        payload: serde_json::json!({
            "operator": operator,
            "reason": reason,
        }),
        occurred_at: Utc::now(),
    }
}

/// Re-derives run status from the truncated timeline's last terminal-ish
/// event type, falling back to `InProgress` when none is found. Mirrors the
/// Event Router's own status projection table (rc-stream) for the subset of
/// event types a rollback could leave dangling.
pub(crate) fn reproject_status(events: &[EventRecord]) -> RunStatus {
    for event in events.iter().rev() {
        match event.event_type.as_str() {
            "response.completed" => return RunStatus::Completed,
            "response.failed" => return RunStatus::Failed,
            "response.cancelled" => return RunStatus::Cancelled,
            "response.incomplete" => return RunStatus::Incomplete,
            "response.queued" => return RunStatus::Queued,
            "response.created" | "response.in_progress" => return RunStatus::InProgress,
            "responses.rollback" => continue,
            _ => return RunStatus::InProgress,
        }
    }
    RunStatus::Queued
}
