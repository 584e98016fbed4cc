use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rc_types::model::{
    DelegationRecord, EventRecord, ModeratorNote, RunRecord, RunStatus, SafetySnapshot,
    TimelineSnapshot,
};
use rc_types::provider::ProviderResult;
use rc_types::{Error, Result};

use crate::traits::{Archive, ArchiveCapabilities, DelegationAware, Exportable, ModerationAware, Prunable, Rollbackable, SafetyAware};
use crate::types::{DelegationUpdate, RecordEventInput, RollbackTarget, SafetyUpdate, StartRunInput};

struct RunEntry {
    record: RunRecord,
    events: Vec<EventRecord>,
}

/// Pure in-memory archive. A single outer `RwLock` over a map guards
/// per-run mutexes, so cross-run writes stay parallel while writes
/// within one run serialize, per spec.md §5.
pub struct InMemoryArchive {
    entries: parking_lot::RwLock<HashMap<String, Mutex<RunEntry>>>,
}

impl InMemoryArchive {
    pub fn new() -> Self {
        Self {
            entries: parking_lot::RwLock::new(HashMap::new()),
        }
    }

    pub fn capabilities(self: Arc<Self>) -> ArchiveCapabilities {
        ArchiveCapabilities {
            core: self.clone(),
            prunable: Some(self.clone()),
            exportable: Some(self.clone()),
            rollbackable: Some(self.clone()),
            safety_aware: Some(self.clone()),
            moderation_aware: Some(self.clone()),
            delegation_aware: Some(self),
        }
    }

    fn with_entry<T>(&self, run_id: &str, f: impl FnOnce(&mut RunEntry) -> Result<T>) -> Result<T> {
        let guard = self.entries.read();
        let mutex = guard
            .get(run_id)
            .ok_or_else(|| Error::NotFound(run_id.to_string()))?;
        let mut entry = mutex.lock();
        f(&mut entry)
    }
}

impl Default for InMemoryArchive {
    fn default() -> Self {
        Self::new()
    }
}

impl Archive for InMemoryArchive {
    fn start_run(&self, input: StartRunInput) -> Result<RunRecord> {
        let mut guard = self.entries.write();
        if guard.contains_key(&input.run_id) {
            return Err(Error::AlreadyExists(input.run_id));
        }
        let record = RunRecord::new(
            input.run_id.clone(),
            input.request,
            input.conversation_id,
            input.metadata,
            input.trace_id,
            input.safety,
        );
        guard.insert(
            input.run_id,
            Mutex::new(RunEntry {
                record: record.clone(),
                events: Vec::new(),
            }),
        );
        Ok(record)
    }

    fn record_event(&self, input: RecordEventInput) -> Result<EventRecord> {
        self.with_entry(&input.run_id.clone(), |entry| {
            let next_expected = entry.events.last().map(|e| e.sequence + 1).unwrap_or(0);
            let sequence = match input.sequence {
                Some(seq) => seq,
                None => next_expected,
            };
            if let Some(last) = entry.events.last() {
                if sequence <= last.sequence && input.sequence.is_some() {
                    if sequence == last.sequence {
                        return Err(Error::SequenceAlreadyRecorded {
                            run_id: input.run_id.clone(),
                            sequence,
                        });
                    }
                    return Err(Error::StaleSequence {
                        run_id: input.run_id.clone(),
                        sequence,
                        last: last.sequence,
                    });
                }
            }
            let event = EventRecord {
                run_id: input.run_id,
                sequence,
                event_type: input.event_type,
                payload: input.payload,
                occurred_at: input.occurred_at,
            };
            entry.events.push(event.clone());
            entry.record.updated_at = event.occurred_at;
            Ok(event)
        })
    }

    fn update_status(
        &self,
        run_id: &str,
        status: RunStatus,
        result: Option<ProviderResult>,
    ) -> Result<RunRecord> {
        self.with_entry(run_id, |entry| {
            entry.record.status = status;
            entry.record.updated_at = Utc::now();
            if result.is_some() {
                entry.record.result = result;
            }
            Ok(entry.record.clone())
        })
    }

    fn get_run(&self, run_id: &str) -> Result<RunRecord> {
        self.with_entry(run_id, |entry| Ok(entry.record.clone()))
    }

    fn get_timeline(&self, run_id: &str) -> Result<Vec<EventRecord>> {
        self.with_entry(run_id, |entry| Ok(entry.events.clone()))
    }

    fn list_runs(&self) -> Result<Vec<RunRecord>> {
        let guard = self.entries.read();
        Ok(guard.values().map(|m| m.lock().record.clone()).collect())
    }

    fn delete_run(&self, run_id: &str) -> Result<()> {
        let mut guard = self.entries.write();
        guard
            .remove(run_id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(run_id.to_string()))
    }

    fn snapshot_at(&self, run_id: &str, sequence: u64) -> Result<TimelineSnapshot> {
        self.with_entry(run_id, |entry| {
            Ok(TimelineSnapshot {
                run_id: run_id.to_string(),
                events: entry
                    .events
                    .iter()
                    .filter(|e| e.sequence <= sequence)
                    .cloned()
                    .collect(),
            })
        })
    }
}

impl Prunable for InMemoryArchive {
    fn prune_older_than(
        &self,
        cutoff: chrono::DateTime<Utc>,
        cold_storage: Option<&Path>,
    ) -> Result<Vec<String>> {
        let stale: Vec<String> = {
            let guard = self.entries.read();
            guard
                .iter()
                .filter(|(_, m)| m.lock().record.updated_at < cutoff)
                .map(|(id, _)| id.clone())
                .collect()
        };
        for run_id in &stale {
            if let Some(dir) = cold_storage {
                self.export_run(run_id, dir)?;
            }
        }
        let mut guard = self.entries.write();
        for run_id in &stale {
            guard.remove(run_id);
        }
        Ok(stale)
    }
}

impl Exportable for InMemoryArchive {
    fn export_run(&self, run_id: &str, export_dir: &Path) -> Result<std::path::PathBuf> {
        let (record, events) = self.with_entry(run_id, |entry| {
            Ok((entry.record.clone(), entry.events.clone()))
        })?;
        crate::export::write_gzip_export(export_dir, &record, &events)
    }
}

impl Rollbackable for InMemoryArchive {
    fn rollback(
        &self,
        run_id: &str,
        target: RollbackTarget,
        operator: Option<String>,
        reason: Option<String>,
    ) -> Result<TimelineSnapshot> {
        self.with_entry(run_id, |entry| {
            let cutoff = crate::rollback::resolve_cutoff(&entry.events, &target)?;
            entry.events.retain(|e| e.sequence <= cutoff);
            let marker_seq = entry.events.last().map(|e| e.sequence + 1).unwrap_or(0);
            let marker = crate::rollback::build_marker(run_id, marker_seq, &operator, &reason);
            entry.events.push(marker.clone());
            entry.record.status = crate::rollback::reproject_status(&entry.events);
            entry.record.result = None;
            entry.record.updated_at = marker.occurred_at;
            Ok(TimelineSnapshot {
                run_id: run_id.to_string(),
                events: entry.events.clone(),
            })
        })
    }
}

impl SafetyAware for InMemoryArchive {
    fn update_safety(&self, run_id: &str, update: SafetyUpdate) -> Result<SafetySnapshot> {
        self.with_entry(run_id, |entry| {
            let mut snapshot = entry.record.safety.clone().unwrap_or_default();
            match update {
                SafetyUpdate::RecordRefusal { at } => snapshot.record_refusal(at),
                SafetyUpdate::SetIdentifier { hashed_identifier } => {
                    snapshot.hashed_identifier = Some(hashed_identifier)
                }
            }
            entry.record.safety = Some(snapshot.clone());
            Ok(snapshot)
        })
    }
}

impl ModerationAware for InMemoryArchive {
    fn add_moderator_note(&self, run_id: &str, note: ModeratorNote) -> Result<ModeratorNote> {
        self.with_entry(run_id, |entry| {
            let mut snapshot = entry.record.safety.clone().unwrap_or_default();
            snapshot.notes.push(note.clone());
            entry.record.safety = Some(snapshot);
            Ok(note)
        })
    }
}

impl DelegationAware for InMemoryArchive {
    fn record_delegation(&self, run_id: &str, record: DelegationRecord) -> Result<DelegationRecord> {
        self.with_entry(run_id, |entry| {
            if entry.record.delegations.iter().any(|d| d.call_id == record.call_id) {
                return Err(Error::AlreadyExists(record.call_id));
            }
            entry.record.delegations.push(record.clone());
            Ok(record)
        })
    }

    fn update_delegation(&self, run_id: &str, update: DelegationUpdate) -> Result<DelegationRecord> {
        self.with_entry(run_id, |entry| {
            let delegation = entry
                .record
                .delegations
                .iter_mut()
                .find(|d| d.call_id == update.call_id)
                .ok_or_else(|| Error::NotFound(update.call_id.clone()))?;
            delegation.status = update.status;
            if update.output.is_some() {
                delegation.output = update.output;
            }
            if update.completed_at.is_some() {
                delegation.completed_at = update.completed_at;
            }
            Ok(delegation.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rc_types::provider::ProviderRequest;

    fn start(archive: &InMemoryArchive, run_id: &str) {
        archive
            .start_run(StartRunInput {
                run_id: run_id.to_string(),
                request: ProviderRequest {
                    model: "gpt-5".into(),
                    ..Default::default()
                },
                conversation_id: None,
                metadata: HashMap::new(),
                trace_id: None,
                safety: None,
            })
            .unwrap();
    }

    #[test]
    fn start_run_rejects_duplicate_ids() {
        let archive = InMemoryArchive::new();
        start(&archive, "run-1");
        let err = archive
            .start_run(StartRunInput {
                run_id: "run-1".to_string(),
                request: ProviderRequest::default(),
                conversation_id: None,
                metadata: HashMap::new(),
                trace_id: None,
                safety: None,
            })
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[test]
    fn record_event_rejects_replayed_sequence() {
        let archive = InMemoryArchive::new();
        start(&archive, "run-1");
        let input = |seq: u64| RecordEventInput {
            run_id: "run-1".to_string(),
            sequence: Some(seq),
            event_type: "response.created".to_string(),
            payload: serde_json::json!({}),
            occurred_at: Utc::now(),
        };
        archive.record_event(input(0)).unwrap();
        let err = archive.record_event(input(0)).unwrap_err();
        assert!(matches!(err, Error::SequenceAlreadyRecorded { .. }));
    }

    #[test]
    fn record_event_rejects_stale_sequence() {
        let archive = InMemoryArchive::new();
        start(&archive, "run-1");
        archive
            .record_event(RecordEventInput {
                run_id: "run-1".to_string(),
                sequence: Some(2),
                event_type: "response.created".to_string(),
                payload: serde_json::json!({}),
                occurred_at: Utc::now(),
            })
            .unwrap();
        let err = archive
            .record_event(RecordEventInput {
                run_id: "run-1".to_string(),
                sequence: Some(1),
                event_type: "response.output_text.delta".to_string(),
                payload: serde_json::json!({}),
                occurred_at: Utc::now(),
            })
            .unwrap_err();
        assert!(matches!(err, Error::StaleSequence { .. }));
    }

    #[test]
    fn delete_run_removes_entry() {
        let archive = InMemoryArchive::new();
        start(&archive, "run-1");
        archive.delete_run("run-1").unwrap();
        assert!(matches!(archive.get_run("run-1").unwrap_err(), Error::NotFound(_)));
    }

    #[test]
    fn rollback_truncates_and_appends_marker() {
        let archive = InMemoryArchive::new();
        start(&archive, "run-1");
        for seq in 0..3 {
            archive
                .record_event(RecordEventInput {
                    run_id: "run-1".to_string(),
                    sequence: Some(seq),
                    event_type: "response.output_text.delta".to_string(),
                    payload: serde_json::json!({}),
                    occurred_at: Utc::now(),
                })
                .unwrap();
        }
        let snapshot = archive
            .rollback("run-1", RollbackTarget::Sequence(1), Some("op".into()), None)
            .unwrap();
        assert_eq!(snapshot.events.len(), 3);
        assert_eq!(snapshot.events.last().unwrap().event_type, "responses.rollback");
    }
}
