//! Optional bearer-token guard for the admin API. Reads `RESPONSES_ADMIN_TOKEN`
//! once at startup (see `main.rs`) and caches its digest in `AppState`; if
//! unset, every route is reachable without auth (dev mode).

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};

use crate::state::AppState;

pub async fn require_admin_token(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let expected = match &state.admin_token_hash {
        Some(hash) => hash,
        None => return next.run(req).await,
    };

    let provided = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");
    let provided_hash = Sha256::digest(provided.as_bytes());

    // Constant-time compare: fold XOR differences across the full digest so
    // timing doesn't leak how many leading bytes matched.
    let equal = provided_hash
        .iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
        && provided_hash.len() == expected.len();

    if !equal {
        return (
            StatusCode::UNAUTHORIZED,
            axum::Json(serde_json::json!({ "error": "invalid or missing admin token" })),
        )
            .into_response();
    }

    next.run(req).await
}
