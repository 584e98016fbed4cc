use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rc_archive::RollbackTarget;
use rc_tracking::ResolveInput;
use rc_types::model::{
    ConversationPolicy, ConversationStrategy, IncidentDisposition, IncidentRecord, IncidentStatus,
    ModeratorNote, RunRecord, RunStatus, RunSummary, TenantRateLimitSummary, TimelineSnapshot,
};
use rc_types::trace::TraceEvent;
use rc_types::{Error, Result};
use serde::Serialize;
use uuid::Uuid;

use crate::coordinator::{status_key, RunCoordinator};
use crate::types::StartRunOptions;

const DEFAULT_COST_PER_1K_TOKENS: f64 = 0.002;

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

#[derive(Debug, Clone, Serialize)]
pub struct TenantRollup {
    pub tenant_id: String,
    pub runs: u64,
    pub tokens: u64,
    pub refusals: u64,
    pub cost: f64,
    pub regions: Vec<String>,
    pub last_run_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationsSummary {
    pub total_runs: u64,
    pub status_counts: BTreeMap<String, u64>,
    pub failures_last_24h: u64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub total_tokens: u64,
    pub average_tokens_per_run: f64,
    pub estimated_cost: f64,
    pub total_refusals: u64,
    pub tenants: Vec<TenantRollup>,
    pub recent_runs: Vec<RunSummary>,
    pub open_incidents: Vec<IncidentRecord>,
    pub rate_limits: Vec<TenantRateLimitSummary>,
}

/// Operations-facing view over the Coordinator: summary rollups, retry,
/// rollback, prune, export, moderator notes, per spec.md §4.11.
pub struct OperationsService {
    coordinator: Arc<RunCoordinator>,
    cost_per_1k_tokens: f64,
}

impl OperationsService {
    pub fn new(coordinator: Arc<RunCoordinator>) -> Self {
        Self {
            coordinator,
            cost_per_1k_tokens: DEFAULT_COST_PER_1K_TOKENS,
        }
    }

    pub fn with_cost_per_1k_tokens(mut self, cost: f64) -> Self {
        self.cost_per_1k_tokens = cost;
        self
    }

    pub fn summary(&self) -> Result<OperationsSummary> {
        let runs = self.coordinator.archive().core.list_runs()?;
        let now = Utc::now();
        let cutoff_24h = now - Duration::hours(24);

        let mut status_counts: BTreeMap<String, u64> = BTreeMap::new();
        let mut failures_last_24h = 0u64;
        let mut last_run_at: Option<DateTime<Utc>> = None;
        let mut total_tokens: u64 = 0;
        let mut total_refusals: u64 = 0;
        let mut tenant_map: HashMap<String, TenantRollup> = HashMap::new();

        for run in &runs {
            *status_counts.entry(status_key(run.status).to_string()).or_insert(0) += 1;

            if matches!(run.status, RunStatus::Failed | RunStatus::Incomplete) && run.updated_at >= cutoff_24h {
                failures_last_24h += 1;
            }

            last_run_at = Some(last_run_at.map_or(run.updated_at, |current| current.max(run.updated_at)));

            let tokens = run.result.as_ref().and_then(|r| r.usage.total_tokens).unwrap_or(0);
            total_tokens += tokens;
            let refusals = run.safety.as_ref().map(|s| s.refusal_count as u64).unwrap_or(0);
            total_refusals += refusals;

            let tenant_id = run.tenant_id().unwrap_or("unknown").to_string();
            let entry = tenant_map.entry(tenant_id.clone()).or_insert_with(|| TenantRollup {
                tenant_id: tenant_id.clone(),
                runs: 0,
                tokens: 0,
                refusals: 0,
                cost: 0.0,
                regions: Vec::new(),
                last_run_at: None,
            });
            entry.runs += 1;
            entry.tokens += tokens;
            entry.refusals += refusals;
            entry.cost = round6((entry.tokens as f64 / 1000.0) * self.cost_per_1k_tokens);
            entry.last_run_at = Some(entry.last_run_at.map_or(run.updated_at, |c| c.max(run.updated_at)));
            if let Some(region) = run.metadata.get("region") {
                if !entry.regions.contains(region) {
                    entry.regions.push(region.clone());
                }
            }
        }

        let mut tenants: Vec<TenantRollup> = tenant_map.into_values().collect();
        tenants.sort_by(|a, b| b.tokens.cmp(&a.tokens));

        let average_tokens_per_run = if runs.is_empty() {
            0.0
        } else {
            total_tokens as f64 / runs.len() as f64
        };
        let estimated_cost = round6((total_tokens as f64 / 1000.0) * self.cost_per_1k_tokens);

        let mut by_recency: Vec<&RunRecord> = runs.iter().collect();
        by_recency.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        let recent_runs: Vec<RunSummary> = by_recency.into_iter().take(10).map(RunSummary::from).collect();

        let open_incidents = self.coordinator.incidents().list(Some(IncidentStatus::Open));
        let rate_limits = self.coordinator.rate_limits().tenant_summaries();

        Ok(OperationsSummary {
            total_runs: runs.len() as u64,
            status_counts,
            failures_last_24h,
            last_run_at,
            total_tokens,
            average_tokens_per_run,
            estimated_cost,
            total_refusals,
            tenants,
            recent_runs,
            open_incidents,
            rate_limits,
        })
    }

    pub fn prune(&self, days: i64, cold_storage: Option<&Path>) -> Result<Vec<String>> {
        if days <= 0 {
            return Err(Error::InvalidRequest("days must be positive".to_string()));
        }
        let cutoff = Utc::now() - Duration::seconds(days * 86_400);
        let prunable = self
            .coordinator
            .archive()
            .prunable
            .as_ref()
            .ok_or_else(|| Error::Unsupported("archive backend does not support pruning".to_string()))?;
        prunable.prune_older_than(cutoff, cold_storage)
    }

    /// Loads `run_id`'s original request and starts a fresh, stateless,
    /// history-less run from it, then resolves every open incident against
    /// the original run, per spec.md §4.11. Incident resolution is required
    /// here, not best-effort: a retry that silently fails to close its
    /// incident would leave the operator's queue stuck open forever.
    pub async fn retry(
        &self,
        run_id: &str,
        tenant_id: Option<String>,
        metadata: Option<HashMap<String, String>>,
        background: bool,
    ) -> Result<(String, crate::types::StartRunOutcome)> {
        let original = self.coordinator.archive().core.get_run(run_id)?;
        let tenant_id = tenant_id
            .or_else(|| original.metadata.get("tenant_id").cloned())
            .or_else(|| original.metadata.get("tenantId").cloned())
            .unwrap_or_else(|| "default".to_string());

        let mut new_metadata = metadata.unwrap_or_default();
        new_metadata.insert("retried_from".to_string(), run_id.to_string());

        let new_run_id = Uuid::new_v4().to_string();
        let options = StartRunOptions {
            tenant_id: Some(tenant_id),
            metadata: Some(new_metadata),
            background,
            policy: Some(ConversationPolicy {
                strategy: ConversationStrategy::Stateless,
                ttl_seconds: None,
            }),
            history: None,
            ..StartRunOptions::new(new_run_id.clone(), original.request.clone())
        };
        let outcome = self.coordinator.start_run(options).await?;

        self.coordinator.incidents().resolve_incidents_by_run(
            run_id,
            ResolveInput {
                resolved_by: "system".to_string(),
                notes: None,
                disposition: IncidentDisposition::Retry,
                linked_run_id: Some(new_run_id.clone()),
            },
        )?;

        Ok((new_run_id, outcome))
    }

    pub fn rollback(
        &self,
        run_id: &str,
        target: RollbackTarget,
        operator: Option<String>,
        reason: Option<String>,
    ) -> Result<TimelineSnapshot> {
        let rollbackable = self
            .coordinator
            .archive()
            .rollbackable
            .as_ref()
            .ok_or_else(|| Error::Unsupported("archive backend does not support rollback".to_string()))?;
        let snapshot = rollbackable.rollback(run_id, target, operator.clone(), reason)?;
        self.coordinator.resync_from_archive(run_id)?;

        let target_sequence = snapshot
            .events
            .last()
            .map(|marker| marker.sequence.saturating_sub(1))
            .unwrap_or(0);
        TraceEvent::RollbackPerformed {
            run_id: run_id.to_string(),
            target_sequence,
            operator,
        }
        .emit();

        Ok(snapshot)
    }

    pub fn export(&self, run_id: &str, export_dir: &Path) -> Result<PathBuf> {
        let exportable = self
            .coordinator
            .archive()
            .exportable
            .as_ref()
            .ok_or_else(|| Error::Unsupported("archive backend does not support export".to_string()))?;
        exportable.export_run(run_id, export_dir)
    }

    pub fn add_moderator_note(&self, run_id: &str, note: ModeratorNote) -> Result<ModeratorNote> {
        let moderation_aware = self
            .coordinator
            .archive()
            .moderation_aware
            .as_ref()
            .ok_or_else(|| Error::Unsupported("archive backend does not support moderator notes".to_string()))?;
        moderation_aware.add_moderator_note(run_id, note)
    }
}
