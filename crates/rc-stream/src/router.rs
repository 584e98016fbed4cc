use std::sync::Arc;

use chrono::Utc;
use rc_archive::{Archive, RecordEventInput};
use rc_types::model::EventRecord;
use rc_types::provider::ProviderResult;
use rc_types::{Error, Result};
use serde_json::Value;

use crate::event::{self, ProviderEvent};

/// One router per active run, narrowed to just the append-and-project
/// responsibility spec.md §4.2 assigns the router — ownership of the
/// routers themselves belongs to the Coordinator, which serializes calls
/// per run.
pub struct EventRouter {
    run_id: String,
    archive: Arc<dyn Archive>,
    last_sequence: u64,
}

impl EventRouter {
    pub fn new(run_id: impl Into<String>, archive: Arc<dyn Archive>) -> Self {
        Self {
            run_id: run_id.into(),
            archive,
            last_sequence: 0,
        }
    }

    /// Rebuilds a router positioned after `last_sequence`, used by
    /// `ResyncFromArchive` to resume routing against a truncated or
    /// replayed timeline without re-validating history that already lives
    /// in the archive.
    pub fn with_last_sequence(run_id: impl Into<String>, archive: Arc<dyn Archive>, last_sequence: u64) -> Self {
        Self {
            run_id: run_id.into(),
            archive,
            last_sequence,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// `HandleEvent` — validates sequencing, appends to the archive,
    /// projects status, and returns the parsed view plus the persisted
    /// record so the Streaming Buffer can be fed the same event.
    pub fn handle_event(&mut self, raw: Value) -> Result<(EventRecord, ProviderEvent)> {
        let sequence = event::extract_sequence(&raw)
            .ok_or_else(|| Error::InvalidSequence(format!("{raw}")))?;

        if sequence <= self.last_sequence {
            if sequence == self.last_sequence {
                return Err(Error::SequenceAlreadyRecorded {
                    run_id: self.run_id.clone(),
                    sequence,
                });
            }
            return Err(Error::StaleSequence {
                run_id: self.run_id.clone(),
                sequence,
                last: self.last_sequence,
            });
        }

        let event_type = event::event_type_str(&raw);
        let parsed = event::parse(&raw);

        let record = self.archive.record_event(RecordEventInput {
            run_id: self.run_id.clone(),
            sequence: Some(sequence),
            event_type,
            payload: raw,
            occurred_at: Utc::now(),
        })?;

        if let Some(status) = event::projected_status(&parsed) {
            let result = if event::is_terminal(&parsed) {
                terminal_result(&parsed)
            } else {
                None
            };
            self.archive.update_status(&self.run_id, status, result)?;
        }

        self.last_sequence = sequence;
        Ok((record, parsed))
    }
}

fn terminal_result(event: &ProviderEvent) -> Option<ProviderResult> {
    let response = match event {
        ProviderEvent::ResponseCompleted { response }
        | ProviderEvent::ResponseFailed { response }
        | ProviderEvent::ResponseCancelled { response }
        | ProviderEvent::ResponseIncomplete { response } => response.as_ref(),
        _ => None,
    }?;
    serde_json::from_value(response.clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rc_archive::{InMemoryArchive, StartRunInput};
    use rc_types::provider::ProviderRequest;
    use std::collections::HashMap;

    fn seeded_router() -> (Arc<InMemoryArchive>, EventRouter) {
        let archive = Arc::new(InMemoryArchive::new());
        archive
            .start_run(StartRunInput {
                run_id: "r1".to_string(),
                request: ProviderRequest {
                    model: "m".into(),
                    ..Default::default()
                },
                conversation_id: None,
                metadata: HashMap::new(),
                trace_id: None,
                safety: None,
            })
            .unwrap();
        let router = EventRouter::new("r1", archive.clone());
        (archive, router)
    }

    #[test]
    fn rejects_non_positive_sequence() {
        let (_archive, mut router) = seeded_router();
        let err = router
            .handle_event(serde_json::json!({"type": "response.in_progress", "sequence_number": 0}))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSequence(_)));
    }

    #[test]
    fn rejects_replayed_sequence() {
        let (_archive, mut router) = seeded_router();
        router
            .handle_event(serde_json::json!({"type": "response.created", "sequence_number": 1}))
            .unwrap();
        let err = router
            .handle_event(serde_json::json!({"type": "response.created", "sequence_number": 1}))
            .unwrap_err();
        assert!(matches!(err, Error::SequenceAlreadyRecorded { .. }));
    }

    #[test]
    fn terminal_event_persists_result() {
        let (archive, mut router) = seeded_router();
        router
            .handle_event(serde_json::json!({
                "type": "response.completed",
                "sequence_number": 1,
                "response": {
                    "id": "resp_1",
                    "status": "completed",
                    "output": [],
                    "usage": {"total_tokens": 30},
                },
            }))
            .unwrap();
        let run = archive.get_run("r1").unwrap();
        assert_eq!(run.status, rc_types::model::RunStatus::Completed);
        assert_eq!(run.result.unwrap().id, "resp_1");
    }
}
