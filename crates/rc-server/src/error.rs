//! Maps `rc_types::Error` onto the admin API's JSON error envelope
//! (`{"error": "..."}`) and an HTTP status code, per spec.md §6.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use rc_types::Error;

pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::InvalidRequest(_) | Error::InvalidSequence(_) | Error::UnknownBuiltin(_) | Error::UnknownTool(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::AlreadyExists(_)
            | Error::SequenceAlreadyRecorded { .. }
            | Error::StaleSequence { .. }
            | Error::AlreadyRegistered(_) => StatusCode::CONFLICT,
            Error::Unsupported(_) => StatusCode::BAD_REQUEST,
            Error::UpstreamFailure(_) | Error::Io(_) | Error::Json(_) | Error::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    async fn envelope(err: Error) -> (StatusCode, serde_json::Value) {
        let response = ApiError::from(err).into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn not_found_maps_to_404_with_an_error_envelope() {
        let (status, body) = envelope(Error::NotFound("run r1".to_string())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not found: run r1");
    }

    #[tokio::test]
    async fn invalid_request_maps_to_400() {
        let (status, _) = envelope(Error::InvalidRequest("bad input".to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn already_exists_maps_to_409() {
        let (status, _) = envelope(Error::AlreadyExists("r1".to_string())).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn upstream_failure_maps_to_500() {
        let (status, _) = envelope(Error::UpstreamFailure("timeout".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
