use chrono::{DateTime, Utc};
use serde::Serialize;

/// Parsed provider rate-limit headers for a single response, tagged with
/// the tenant that issued the request (if known).
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_requests: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_requests: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_requests_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_tokens_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitAlert {
    Requests,
    Tokens,
}

#[derive(Debug, Clone, Serialize)]
pub struct TenantRateLimitSummary {
    pub tenant_id: String,
    pub latest: RateLimitSnapshot,
    pub mean_processing_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_requests_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_tokens_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<RateLimitAlert>,
}
