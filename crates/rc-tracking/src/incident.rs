use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;
use rc_types::model::{IncidentDisposition, IncidentInput, IncidentRecord, IncidentStatus, Resolution};
use rc_types::{Error, Result};
use uuid::Uuid;

/// Fields needed to resolve one or more incidents; `resolved_at` is always
/// stamped at call time.
#[derive(Debug, Clone)]
pub struct ResolveInput {
    pub resolved_by: String,
    pub notes: Option<String>,
    pub disposition: IncidentDisposition,
    pub linked_run_id: Option<String>,
}

/// JSON-array-on-disk incident log, per spec.md §4.5. A mutex-serialized
/// file-backed store: the full array is read at construction, then
/// rewritten atomically on every mutation.
pub struct IncidentLog {
    path: PathBuf,
    records: Mutex<Vec<IncidentRecord>>,
}

impl IncidentLog {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(Error::Io(e)),
        };
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    fn persist(&self, records: &[IncidentRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let bytes = serde_json::to_vec_pretty(records)?;
        let tmp = tempfile::NamedTempFile::new_in(dir)?;
        std::fs::write(tmp.path(), &bytes)?;
        tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    /// Opens a new incident, or — if an open incident already exists for
    /// this run — merges in any previously-missing metadata rather than
    /// creating a duplicate.
    pub fn record_incident(&self, input: IncidentInput) -> Result<IncidentRecord> {
        let mut records = self.records.lock();
        if let Some(existing) = records
            .iter_mut()
            .find(|r| r.run_id == input.run_id && r.status == IncidentStatus::Open)
        {
            if existing.tenant_id.is_none() {
                existing.tenant_id = input.tenant_id;
            }
            if existing.model.is_none() {
                existing.model = input.model;
            }
            if existing.request_id.is_none() {
                existing.request_id = input.request_id;
            }
            if existing.trace_id.is_none() {
                existing.trace_id = input.trace_id;
            }
            if existing.reason.is_none() {
                existing.reason = input.reason;
            }
            let merged = existing.clone();
            self.persist(&records)?;
            return Ok(merged);
        }

        let record = IncidentRecord {
            id: Uuid::new_v4().to_string(),
            run_id: input.run_id,
            status: IncidentStatus::Open,
            kind: input.kind,
            sequence: input.sequence,
            occurred_at: Utc::now(),
            tenant_id: input.tenant_id,
            model: input.model,
            request_id: input.request_id,
            trace_id: input.trace_id,
            reason: input.reason,
            resolution: None,
        };
        records.push(record.clone());
        self.persist(&records)?;
        Ok(record)
    }

    /// Resolving an already-resolved incident is a no-op: the existing
    /// record is returned unchanged.
    pub fn resolve_incident(&self, id: &str, input: ResolveInput) -> Result<IncidentRecord> {
        let mut records = self.records.lock();
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        if record.status == IncidentStatus::Resolved {
            return Ok(record.clone());
        }
        record.status = IncidentStatus::Resolved;
        record.resolution = Some(Resolution {
            resolved_at: Utc::now(),
            resolved_by: input.resolved_by,
            notes: input.notes,
            disposition: input.disposition,
            linked_run_id: input.linked_run_id,
        });
        let resolved = record.clone();
        self.persist(&records)?;
        Ok(resolved)
    }

    pub fn resolve_incidents_by_run(&self, run_id: &str, input: ResolveInput) -> Result<Vec<IncidentRecord>> {
        let mut records = self.records.lock();
        let mut resolved = Vec::new();
        for record in records.iter_mut() {
            if record.run_id == run_id && record.status == IncidentStatus::Open {
                record.status = IncidentStatus::Resolved;
                record.resolution = Some(Resolution {
                    resolved_at: Utc::now(),
                    resolved_by: input.resolved_by.clone(),
                    notes: input.notes.clone(),
                    disposition: input.disposition,
                    linked_run_id: input.linked_run_id.clone(),
                });
                resolved.push(record.clone());
            }
        }
        if !resolved.is_empty() {
            self.persist(&records)?;
        }
        Ok(resolved)
    }

    pub fn get(&self, id: &str) -> Result<IncidentRecord> {
        self.records
            .lock()
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    pub fn list(&self, status: Option<IncidentStatus>) -> Vec<IncidentRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| status.map(|s| r.status == s).unwrap_or(true))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log() -> (IncidentLog, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let log = IncidentLog::open(dir.path().join("incidents.json")).unwrap();
        (log, dir)
    }

    fn input(run_id: &str) -> IncidentInput {
        IncidentInput {
            run_id: run_id.to_string(),
            kind: rc_types::model::IncidentKind::Failed,
            sequence: 2,
            ..Default::default()
        }
    }

    #[test]
    fn record_incident_merges_instead_of_duplicating() {
        let (log, _dir) = log();
        log.record_incident(input("r1")).unwrap();
        let mut second = input("r1");
        second.tenant_id = Some("tenant-a".to_string());
        let merged = log.record_incident(second).unwrap();
        assert_eq!(merged.tenant_id.as_deref(), Some("tenant-a"));
        assert_eq!(log.list(None).len(), 1);
    }

    #[test]
    fn resolving_twice_is_a_no_op() {
        let (log, _dir) = log();
        let record = log.record_incident(input("r1")).unwrap();
        let resolved = log
            .resolve_incident(
                &record.id,
                ResolveInput {
                    resolved_by: "system".to_string(),
                    notes: None,
                    disposition: IncidentDisposition::Retry,
                    linked_run_id: Some("r1b".to_string()),
                },
            )
            .unwrap();
        let resolved_again = log
            .resolve_incident(
                &record.id,
                ResolveInput {
                    resolved_by: "someone-else".to_string(),
                    notes: None,
                    disposition: IncidentDisposition::Manual,
                    linked_run_id: None,
                },
            )
            .unwrap();
        assert_eq!(
            resolved.resolution.unwrap().resolved_by,
            resolved_again.resolution.unwrap().resolved_by
        );
    }

    #[test]
    fn resolve_incidents_by_run_only_affects_open_ones() {
        let (log, _dir) = log();
        log.record_incident(input("r1")).unwrap();
        let resolved = log
            .resolve_incidents_by_run(
                "r1",
                ResolveInput {
                    resolved_by: "system".to_string(),
                    notes: None,
                    disposition: IncidentDisposition::Retry,
                    linked_run_id: Some("r1b".to_string()),
                },
            )
            .unwrap();
        assert_eq!(resolved.len(), 1);
        assert!(log.resolve_incidents_by_run("r1", ResolveInput {
            resolved_by: "system".to_string(),
            notes: None,
            disposition: IncidentDisposition::Retry,
            linked_run_id: None,
        }).unwrap().is_empty());
    }
}
