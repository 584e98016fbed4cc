use chrono::Utc;
use rc_archive::DelegationAware;
use rc_types::model::{DelegationRecord, DelegationStatus};
use rc_stream::ProviderEvent;
use serde_json::Value;
use uuid::Uuid;
use tracing::warn;

fn str_at<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key).and_then(Value::as_str)
}

fn parse_arguments(raw: Option<&Value>) -> Value {
    match raw {
        Some(Value::String(s)) => serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.clone())),
        Some(other) => other.clone(),
        None => Value::Null,
    }
}

/// Per-run delegation cache that mirrors tool-call lifecycle in process and
/// writes through to the archive, per spec.md §4.6. Owned by the
/// Coordinator alongside the router and streaming buffer for the same run.
pub struct DelegationTracker {
    run_id: String,
    entries: Vec<DelegationRecord>,
}

impl DelegationTracker {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> Vec<DelegationRecord> {
        self.entries.clone()
    }

    /// Write-through is best-effort: archive errors are logged, never
    /// propagated, so a delegation-tracking hiccup can't interrupt primary
    /// event processing (spec.md §7).
    pub fn apply(&mut self, event: &ProviderEvent, archive: Option<&dyn DelegationAware>) {
        match event {
            ProviderEvent::FunctionCallArgumentsDone { payload } => {
                let call_id = str_at(payload, "call_id")
                    .or_else(|| str_at(payload, "item_id"))
                    .map(str::to_string)
                    .unwrap_or_else(|| Uuid::new_v4().to_string());
                let tool_name = str_at(payload, "name")
                    .or_else(|| payload.pointer("/function/name").and_then(Value::as_str))
                    .unwrap_or("unknown_tool")
                    .to_string();
                let arguments = parse_arguments(payload.get("arguments"));
                let record = DelegationRecord::requested(call_id.clone(), tool_name, arguments, Utc::now());
                self.entries.push(record.clone());
                if let Some(archive) = archive {
                    if let Err(err) = archive.record_delegation(&self.run_id, record) {
                        warn!(run_id = %self.run_id, %call_id, error = %err, "failed to record delegation");
                    }
                }
            }
            ProviderEvent::OutputItemDone { item } => {
                if str_at(item, "type") != Some("tool_call") {
                    return;
                }
                let call_id = match str_at(item, "call_id").or_else(|| str_at(item, "id")) {
                    Some(id) => id.to_string(),
                    None => return,
                };
                let failed = str_at(item, "status") == Some("failed");
                let status = if failed {
                    DelegationStatus::Failed
                } else {
                    DelegationStatus::Completed
                };
                let output = item.get("output").cloned();
                let completed_at = Utc::now();

                match self.entries.iter_mut().find(|d| d.call_id == call_id) {
                    Some(existing) => {
                        existing.status = status;
                        existing.output = output.clone();
                        existing.completed_at = Some(completed_at);
                    }
                    None => {
                        let mut seeded = DelegationRecord::requested(
                            call_id.clone(),
                            str_at(item, "name").unwrap_or("unknown_tool").to_string(),
                            item.get("arguments").cloned().unwrap_or(Value::Null),
                            completed_at,
                        );
                        seeded.status = status;
                        seeded.output = output.clone();
                        seeded.completed_at = Some(completed_at);
                        self.entries.push(seeded);
                    }
                }

                if let Some(archive) = archive {
                    let update = rc_archive::DelegationUpdate {
                        call_id: call_id.clone(),
                        status,
                        output,
                        completed_at: Some(completed_at),
                    };
                    if archive.update_delegation(&self.run_id, update).is_err() {
                        if let Some(record) = self.entries.iter().find(|d| d.call_id == call_id) {
                            if let Err(err) = archive.record_delegation(&self.run_id, record.clone()) {
                                warn!(run_id = %self.run_id, %call_id, error = %err, "failed to seed delegation");
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_call_arguments_done_starts_a_delegation() {
        let mut tracker = DelegationTracker::new("r1");
        tracker.apply(
            &ProviderEvent::FunctionCallArgumentsDone {
                payload: serde_json::json!({
                    "call_id": "c1",
                    "name": "search",
                    "arguments": "{\"q\":\"rust\"}",
                }),
            },
            None,
        );
        let entries = tracker.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, DelegationStatus::Requested);
        assert_eq!(entries[0].arguments, serde_json::json!({"q": "rust"}));
    }

    #[test]
    fn output_item_done_completes_matching_delegation() {
        let mut tracker = DelegationTracker::new("r1");
        tracker.apply(
            &ProviderEvent::FunctionCallArgumentsDone {
                payload: serde_json::json!({"call_id": "c1", "name": "search", "arguments": {}}),
            },
            None,
        );
        tracker.apply(
            &ProviderEvent::OutputItemDone {
                item: serde_json::json!({"type": "tool_call", "call_id": "c1", "status": "completed", "output": "ok"}),
            },
            None,
        );
        let entries = tracker.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, DelegationStatus::Completed);
    }

    #[test]
    fn output_item_done_seeds_delegation_when_out_of_order() {
        let mut tracker = DelegationTracker::new("r1");
        tracker.apply(
            &ProviderEvent::OutputItemDone {
                item: serde_json::json!({"type": "tool_call", "call_id": "c1", "status": "failed"}),
            },
            None,
        );
        let entries = tracker.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, DelegationStatus::Failed);
    }
}
