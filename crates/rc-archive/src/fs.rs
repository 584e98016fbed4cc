use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
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

/// Filesystem-backed archive: one directory per run under `base_dir`,
/// holding `run.json` and `events.json`. Reads treat a missing run
/// directory as `NotFound` rather than an IO error; writes go through a
/// temp-file-then-rename so a crash mid-write never corrupts either file.
pub struct FsArchive {
    base_dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FsArchive {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            locks: Mutex::new(HashMap::new()),
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

    fn lock_for(&self, run_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(run_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn run_dir(&self, run_id: &str) -> PathBuf {
        self.base_dir.join(run_id)
    }

    fn read_record(&self, run_id: &str) -> Result<RunRecord> {
        let path = self.run_dir(run_id).join("run.json");
        let bytes = std::fs::read(&path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                Error::NotFound(run_id.to_string())
            } else {
                Error::Io(e)
            }
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn read_events(&self, run_id: &str) -> Result<Vec<EventRecord>> {
        let path = self.run_dir(run_id).join("events.json");
        match std::fs::read(&path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn write_atomic(&self, dir: &Path, name: &str, bytes: &[u8]) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let tmp = tempfile::NamedTempFile::new_in(dir)?;
        std::fs::write(tmp.path(), bytes)?;
        tmp.persist(dir.join(name)).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    fn write_record(&self, record: &RunRecord) -> Result<()> {
        let dir = self.run_dir(&record.run_id);
        let bytes = serde_json::to_vec_pretty(record)?;
        self.write_atomic(&dir, "run.json", &bytes)
    }

    fn write_events(&self, run_id: &str, events: &[EventRecord]) -> Result<()> {
        let dir = self.run_dir(run_id);
        let bytes = serde_json::to_vec_pretty(events)?;
        self.write_atomic(&dir, "events.json", &bytes)
    }

    fn with_run<T>(&self, run_id: &str, f: impl FnOnce(&mut RunRecord, &mut Vec<EventRecord>) -> Result<T>) -> Result<T> {
        let lock = self.lock_for(run_id);
        let _guard = lock.lock();
        let mut record = self.read_record(run_id)?;
        let mut events = self.read_events(run_id)?;
        let out = f(&mut record, &mut events)?;
        self.write_record(&record)?;
        self.write_events(run_id, &events)?;
        Ok(out)
    }
}

impl Archive for FsArchive {
    fn start_run(&self, input: StartRunInput) -> Result<RunRecord> {
        let lock = self.lock_for(&input.run_id);
        let _guard = lock.lock();
        if self.run_dir(&input.run_id).join("run.json").exists() {
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
        self.write_record(&record)?;
        self.write_events(&input.run_id, &[])?;
        Ok(record)
    }

    fn record_event(&self, input: RecordEventInput) -> Result<EventRecord> {
        self.with_run(&input.run_id, |record, events| {
            let sequence = match input.sequence {
                Some(seq) => seq,
                None => events.last().map(|e| e.sequence + 1).unwrap_or(0),
            };
            if let Some(last) = events.last() {
                if input.sequence.is_some() && sequence <= last.sequence {
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
                run_id: input.run_id.clone(),
                sequence,
                event_type: input.event_type,
                payload: input.payload,
                occurred_at: input.occurred_at,
            };
            events.push(event.clone());
            record.updated_at = event.occurred_at;
            Ok(event)
        })
    }

    fn update_status(
        &self,
        run_id: &str,
        status: RunStatus,
        result: Option<ProviderResult>,
    ) -> Result<RunRecord> {
        self.with_run(run_id, |record, _events| {
            record.status = status;
            record.updated_at = Utc::now();
            if result.is_some() {
                record.result = result;
            }
            Ok(record.clone())
        })
    }

    fn get_run(&self, run_id: &str) -> Result<RunRecord> {
        let lock = self.lock_for(run_id);
        let _guard = lock.lock();
        self.read_record(run_id)
    }

    fn get_timeline(&self, run_id: &str) -> Result<Vec<EventRecord>> {
        let lock = self.lock_for(run_id);
        let _guard = lock.lock();
        self.read_record(run_id)?;
        self.read_events(run_id)
    }

    fn list_runs(&self) -> Result<Vec<RunRecord>> {
        let mut runs = Vec::new();
        let entries = match std::fs::read_dir(&self.base_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(runs),
            Err(e) => return Err(Error::Io(e)),
        };
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(run_id) = entry.file_name().to_str() {
                if let Ok(record) = self.read_record(run_id) {
                    runs.push(record);
                }
            }
        }
        Ok(runs)
    }

    fn delete_run(&self, run_id: &str) -> Result<()> {
        let lock = self.lock_for(run_id);
        let _guard = lock.lock();
        let dir = self.run_dir(run_id);
        if !dir.exists() {
            return Err(Error::NotFound(run_id.to_string()));
        }
        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }

    fn snapshot_at(&self, run_id: &str, sequence: u64) -> Result<TimelineSnapshot> {
        let lock = self.lock_for(run_id);
        let _guard = lock.lock();
        self.read_record(run_id)?;
        let events = self
            .read_events(run_id)?
            .into_iter()
            .filter(|e| e.sequence <= sequence)
            .collect();
        Ok(TimelineSnapshot {
            run_id: run_id.to_string(),
            events,
        })
    }
}

impl Prunable for FsArchive {
    fn prune_older_than(
        &self,
        cutoff: chrono::DateTime<Utc>,
        cold_storage: Option<&Path>,
    ) -> Result<Vec<String>> {
        let mut pruned = Vec::new();
        for record in self.list_runs()? {
            if record.updated_at < cutoff {
                if let Some(dir) = cold_storage {
                    self.export_run(&record.run_id, dir)?;
                }
                self.delete_run(&record.run_id)?;
                pruned.push(record.run_id);
            }
        }
        Ok(pruned)
    }
}

impl Exportable for FsArchive {
    fn export_run(&self, run_id: &str, export_dir: &Path) -> Result<PathBuf> {
        let lock = self.lock_for(run_id);
        let _guard = lock.lock();
        let record = self.read_record(run_id)?;
        let events = self.read_events(run_id)?;
        crate::export::write_gzip_export(export_dir, &record, &events)
    }
}

impl Rollbackable for FsArchive {
    fn rollback(
        &self,
        run_id: &str,
        target: RollbackTarget,
        operator: Option<String>,
        reason: Option<String>,
    ) -> Result<TimelineSnapshot> {
        self.with_run(run_id, |record, events| {
            let cutoff = crate::rollback::resolve_cutoff(events, &target)?;
            events.retain(|e| e.sequence <= cutoff);
            let marker_seq = events.last().map(|e| e.sequence + 1).unwrap_or(0);
            let marker = crate::rollback::build_marker(run_id, marker_seq, &operator, &reason);
            events.push(marker.clone());
            record.status = crate::rollback::reproject_status(events);
            record.result = None;
            record.updated_at = marker.occurred_at;
            Ok(TimelineSnapshot {
                run_id: run_id.to_string(),
                events: events.clone(),
            })
        })
    }
}

impl SafetyAware for FsArchive {
    fn update_safety(&self, run_id: &str, update: SafetyUpdate) -> Result<SafetySnapshot> {
        self.with_run(run_id, |record, _events| {
            let mut snapshot = record.safety.clone().unwrap_or_default();
            match update {
                SafetyUpdate::RecordRefusal { at } => snapshot.record_refusal(at),
                SafetyUpdate::SetIdentifier { hashed_identifier } => {
                    snapshot.hashed_identifier = Some(hashed_identifier)
                }
            }
            record.safety = Some(snapshot.clone());
            Ok(snapshot)
        })
    }
}

impl ModerationAware for FsArchive {
    fn add_moderator_note(&self, run_id: &str, note: ModeratorNote) -> Result<ModeratorNote> {
        self.with_run(run_id, |record, _events| {
            let mut snapshot = record.safety.clone().unwrap_or_default();
            snapshot.notes.push(note.clone());
            record.safety = Some(snapshot);
            Ok(note)
        })
    }
}

impl DelegationAware for FsArchive {
    fn record_delegation(&self, run_id: &str, delegation: DelegationRecord) -> Result<DelegationRecord> {
        self.with_run(run_id, |record, _events| {
            if record.delegations.iter().any(|d| d.call_id == delegation.call_id) {
                return Err(Error::AlreadyExists(delegation.call_id));
            }
            record.delegations.push(delegation.clone());
            Ok(delegation)
        })
    }

    fn update_delegation(&self, run_id: &str, update: DelegationUpdate) -> Result<DelegationRecord> {
        self.with_run(run_id, |record, _events| {
            let delegation = record
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

    fn archive() -> (FsArchive, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (FsArchive::new(dir.path()), dir)
    }

    #[test]
    fn get_run_on_missing_directory_is_not_found() {
        let (archive, _dir) = archive();
        assert!(matches!(archive.get_run("missing").unwrap_err(), Error::NotFound(_)));
    }

    #[test]
    fn start_and_reread_round_trips() {
        let (archive, _dir) = archive();
        archive
            .start_run(StartRunInput {
                run_id: "run-1".to_string(),
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
        let record = archive.get_run("run-1").unwrap();
        assert_eq!(record.status, RunStatus::Queued);
        assert!(archive.get_timeline("run-1").unwrap().is_empty());
    }

    #[test]
    fn export_run_writes_tarball() {
        let (archive, dir) = archive();
        archive
            .start_run(StartRunInput {
                run_id: "run-1".to_string(),
                request: ProviderRequest::default(),
                conversation_id: None,
                metadata: HashMap::new(),
                trace_id: None,
                safety: None,
            })
            .unwrap();
        let export_dir = dir.path().join("exports");
        let path = archive.export_run("run-1", &export_dir).unwrap();
        assert!(path.exists());
    }
}
