//! Router assembly for the admin API: a plain `Router<AppState>` with the
//! admin-token guard applied as a single `middleware::from_fn_with_state`
//! layer over every route in the table.

mod ops;
mod runs;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::auth::require_admin_token;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/responses/runs", get(runs::list_runs))
        .route("/responses/runs/:id", get(runs::get_run))
        .route("/responses/runs/:id/retry", post(runs::retry_run))
        .route("/responses/runs/:id/rollback", post(runs::rollback_run))
        .route("/responses/runs/:id/moderation-notes", post(runs::add_moderation_note))
        .route("/responses/runs/:id/export", post(runs::export_run))
        .route("/responses/ops/summary", get(ops::summary))
        .route("/responses/ops/incidents", get(ops::list_incidents))
        .route("/responses/ops/incidents/:id/resolve", post(ops::resolve_incident))
        .route("/responses/ops/prune", post(ops::prune))
        .layer(middleware::from_fn_with_state(state.clone(), require_admin_token))
        .with_state(state)
}
