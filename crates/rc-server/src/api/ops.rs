//! `/responses/ops` — the operator-facing summary, incident queue, and
//! maintenance endpoints from spec.md §6.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Json};
use rc_tracking::ResolveInput;
use rc_types::model::{IncidentDisposition, IncidentStatus};
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn summary(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let summary = state.ops.summary()?;
    Ok(Json(json!(summary)))
}

#[derive(Debug, Deserialize)]
pub struct IncidentsQuery {
    pub status: Option<String>,
}

pub async fn list_incidents(
    State(state): State<AppState>,
    Query(query): Query<IncidentsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let status = match query.status.as_deref() {
        Some("open") => Some(IncidentStatus::Open),
        Some("resolved") => Some(IncidentStatus::Resolved),
        Some(other) => {
            return Err(rc_types::Error::InvalidRequest(format!("unknown incident status {other}")).into())
        }
        None => None,
    };
    let incidents = state.coordinator.incidents().list(status);
    Ok(Json(json!({ "incidents": incidents })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveIncidentBody {
    pub resolved_by: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub disposition: Option<IncidentDisposition>,
    #[serde(default)]
    pub linked_run_id: Option<String>,
}

pub async fn resolve_incident(
    State(state): State<AppState>,
    Path(incident_id): Path<String>,
    Json(body): Json<ResolveIncidentBody>,
) -> Result<impl IntoResponse, ApiError> {
    let incident = state.coordinator.incidents().resolve_incident(
        &incident_id,
        ResolveInput {
            resolved_by: body.resolved_by,
            notes: body.notes,
            disposition: body.disposition.unwrap_or(IncidentDisposition::Manual),
            linked_run_id: body.linked_run_id,
        },
    )?;
    Ok(Json(json!(incident)))
}

#[derive(Debug, Deserialize)]
pub struct PruneBody {
    pub days: i64,
}

pub async fn prune(State(state): State<AppState>, Json(body): Json<PruneBody>) -> Result<impl IntoResponse, ApiError> {
    let cold_storage = state.config.archive.cold_storage_dir.as_deref();
    let pruned = state.ops.prune(body.days, cold_storage)?;
    let summary = state.ops.summary()?;
    Ok(Json(json!({ "ok": true, "pruned": pruned, "summary": summary })))
}
