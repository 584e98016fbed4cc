use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rc_types::model::{
    DelegationRecord, EventRecord, ModeratorNote, RunRecord, SafetySnapshot, TimelineSnapshot,
};
use rc_types::Result;

use crate::types::{DelegationUpdate, RecordEventInput, RollbackTarget, SafetyUpdate, StartRunInput};

/// The required surface every backend implements: run creation, append-only
/// event recording, status projection, and read access. Everything else
/// (pruning, export, rollback, safety/moderation/delegation bookkeeping) is
/// an optional capability a backend opts into separately, per spec.md §9 —
/// callers probe for the capability once at construction rather than on
/// every call.
pub trait Archive: Send + Sync {
    fn start_run(&self, input: StartRunInput) -> Result<RunRecord>;

    fn record_event(&self, input: RecordEventInput) -> Result<EventRecord>;

    fn update_status(
        &self,
        run_id: &str,
        status: rc_types::model::RunStatus,
        result: Option<ProviderResultArg>,
    ) -> Result<RunRecord>;

    fn get_run(&self, run_id: &str) -> Result<RunRecord>;

    fn get_timeline(&self, run_id: &str) -> Result<Vec<EventRecord>>;

    fn list_runs(&self) -> Result<Vec<RunRecord>>;

    fn delete_run(&self, run_id: &str) -> Result<()>;

    fn snapshot_at(&self, run_id: &str, sequence: u64) -> Result<TimelineSnapshot>;
}

/// Re-exported under a local alias so `update_status`'s signature doesn't
/// force every caller to import `rc_types::provider::ProviderResult`
/// directly just to pass `None`.
pub type ProviderResultArg = rc_types::provider::ProviderResult;

pub trait Prunable: Archive {
    /// Deletes every run whose `updated_at` is older than `cutoff`.
    /// Returns the deleted run ids. When `cold_storage` is set, each run's
    /// timeline is exported there (via the backend's own export mechanism)
    /// before deletion instead of being discarded.
    fn prune_older_than(&self, cutoff: DateTime<Utc>, cold_storage: Option<&Path>) -> Result<Vec<String>>;
}

pub trait Exportable: Archive {
    /// Writes a gzip archive containing the run record and its full
    /// timeline into `export_dir`, atomically, and returns the file path.
    fn export_run(&self, run_id: &str, export_dir: &Path) -> Result<PathBuf>;
}

pub trait Rollbackable: Archive {
    /// Truncates a run's timeline back to (and including) `target`, clears
    /// any terminal result, re-projects status from the remaining events,
    /// and appends a synthetic `responses.rollback` marker event. Returns
    /// the truncated timeline.
    fn rollback(
        &self,
        run_id: &str,
        target: RollbackTarget,
        operator: Option<String>,
        reason: Option<String>,
    ) -> Result<TimelineSnapshot>;
}

pub trait SafetyAware: Archive {
    fn update_safety(&self, run_id: &str, update: SafetyUpdate) -> Result<SafetySnapshot>;
}

pub trait ModerationAware: Archive {
    fn add_moderator_note(&self, run_id: &str, note: ModeratorNote) -> Result<ModeratorNote>;
}

pub trait DelegationAware: Archive {
    fn record_delegation(&self, run_id: &str, record: DelegationRecord) -> Result<DelegationRecord>;

    fn update_delegation(&self, run_id: &str, update: DelegationUpdate) -> Result<DelegationRecord>;
}

/// A backend's capability set, resolved once at construction so the
/// coordinator never has to downcast or probe trait objects at call time.
#[derive(Clone)]
pub struct ArchiveCapabilities {
    pub core: Arc<dyn Archive>,
    pub prunable: Option<Arc<dyn Prunable>>,
    pub exportable: Option<Arc<dyn Exportable>>,
    pub rollbackable: Option<Arc<dyn Rollbackable>>,
    pub safety_aware: Option<Arc<dyn SafetyAware>>,
    pub moderation_aware: Option<Arc<dyn ModerationAware>>,
    pub delegation_aware: Option<Arc<dyn DelegationAware>>,
}
