//! `/responses/runs` — run listing, detail, retry, rollback, moderation
//! notes, export. Handlers build `serde_json::Value` bodies by hand for the
//! types that don't derive `Serialize` (`BufferedMessage`, `AudioSegment`,
//! `ImageSegment`, `TranscriptSegment`), assembling the response JSON inline
//! with `serde_json::json!()` rather than relying on a derived impl.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json};
use rc_archive::RollbackTarget;
use rc_types::model::{ModerationDisposition, ModeratorNote, RunSummary};
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn list_runs(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let runs = state.coordinator.archive().core.list_runs()?;
    let summaries: Vec<RunSummary> = runs.iter().map(RunSummary::from).collect();
    Ok(Json(json!({ "runs": summaries })))
}

pub async fn get_run(State(state): State<AppState>, Path(run_id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let run = state.coordinator.archive().core.get_run(&run_id)?;
    let events = state.coordinator.archive().core.get_timeline(&run_id)?;
    let buffered_messages: Vec<_> = state
        .coordinator
        .get_buffered_messages(&run_id)?
        .into_iter()
        .map(|m| json!({"itemId": m.item_id, "text": m.text}))
        .collect();
    let reasoning = state.coordinator.get_reasoning(&run_id)?;
    let refusals = state.coordinator.get_refusals(&run_id)?;
    let output_audio: Vec<_> = state
        .coordinator
        .get_output_audio(&run_id)?
        .into_iter()
        .map(|a| json!({"itemId": a.item_id, "audioBase64": a.audio_base64, "format": a.format, "transcript": a.transcript}))
        .collect();
    let output_images: Vec<_> = state
        .coordinator
        .get_images(&run_id)?
        .into_iter()
        .map(|i| {
            json!({
                "itemId": i.item_id,
                "imageBase64": i.best_b64(),
                "imageUrl": i.image_url,
                "size": i.size,
            })
        })
        .collect();
    let input_transcripts: Vec<_> = state
        .coordinator
        .get_input_transcripts(&run_id)?
        .into_iter()
        .map(|t| json!({"itemId": t.item_id, "transcript": t.transcript}))
        .collect();
    let delegations = state.coordinator.get_delegations(&run_id)?;

    let tenant_id = run.tenant_id().map(str::to_string);
    let rate_limits: Vec<_> = state
        .coordinator
        .rate_limits()
        .tenant_summaries()
        .into_iter()
        .filter(|s| tenant_id.as_deref().map(|t| t == s.tenant_id).unwrap_or(true))
        .collect();
    let incidents: Vec<_> = state
        .coordinator
        .incidents()
        .list(None)
        .into_iter()
        .filter(|i| i.run_id == run_id)
        .collect();

    Ok(Json(json!({
        "run": run,
        "events": events,
        "bufferedMessages": buffered_messages,
        "reasoning": reasoning,
        "refusals": refusals,
        "outputAudio": output_audio,
        "outputImages": output_images,
        "inputTranscripts": input_transcripts,
        "delegations": delegations,
        "rateLimits": rate_limits,
        "incidents": incidents,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryBody {
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
    #[serde(default)]
    pub background: bool,
}

pub async fn retry_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    Json(body): Json<RetryBody>,
) -> Result<impl IntoResponse, ApiError> {
    let (new_run_id, _outcome) = state
        .ops
        .retry(&run_id, body.tenant_id, body.metadata, body.background)
        .await?;
    let run = state.coordinator.archive().core.get_run(&new_run_id)?;
    Ok(Json(json!(RunSummary::from(&run))))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackBody {
    #[serde(default)]
    pub sequence: Option<u64>,
    #[serde(default)]
    pub tool_call_id: Option<String>,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn rollback_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    Json(body): Json<RollbackBody>,
) -> Result<impl IntoResponse, ApiError> {
    let target = match (body.sequence, body.tool_call_id) {
        (Some(seq), _) => RollbackTarget::Sequence(seq),
        (None, Some(id)) => RollbackTarget::ToolCallId(id),
        (None, None) => {
            return Err(rc_types::Error::InvalidRequest("rollback requires sequence or toolCallId".to_string()).into())
        }
    };
    let snapshot = state.ops.rollback(&run_id, target, body.operator, body.reason)?;
    Ok(Json(json!(snapshot)))
}

#[derive(Debug, Deserialize)]
pub struct ModerationNoteBody {
    pub reviewer: String,
    pub note: String,
    pub disposition: ModerationDisposition,
}

pub async fn add_moderation_note(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    Json(body): Json<ModerationNoteBody>,
) -> Result<impl IntoResponse, ApiError> {
    let note = ModeratorNote {
        reviewer: body.reviewer,
        note: body.note,
        disposition: body.disposition,
        recorded_at: chrono::Utc::now(),
    };
    let saved = state.ops.add_moderator_note(&run_id, note)?;
    Ok(Json(json!(saved)))
}

pub async fn export_run(State(state): State<AppState>, Path(run_id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let path = state.ops.export(&run_id, &state.config.archive.export_dir)?;
    Ok(Json(json!({ "path": path })))
}
