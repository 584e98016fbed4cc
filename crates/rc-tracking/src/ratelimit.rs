use std::collections::{HashMap, VecDeque};

use chrono::Utc;
use parking_lot::Mutex;
use rc_types::model::{RateLimitAlert, RateLimitSnapshot, TenantRateLimitSummary};
use rc_types::provider::ProviderHeaders;

const HISTORY_CAP: usize = 50;

struct TrackerState {
    last: Option<RateLimitSnapshot>,
    by_tenant: HashMap<String, VecDeque<RateLimitSnapshot>>,
}

/// Tracks provider rate-limit headers per tenant, per spec.md §4.4.
/// A single mutex guards a per-key map, sized for low write contention —
/// one capture per provider response.
pub struct RateLimitTracker {
    state: Mutex<TrackerState>,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TrackerState {
                last: None,
                by_tenant: HashMap::new(),
            }),
        }
    }

    pub fn capture(&self, headers: &ProviderHeaders, tenant_id: Option<String>) -> RateLimitSnapshot {
        let snapshot = RateLimitSnapshot {
            tenant_id: tenant_id.clone(),
            limit_requests: parse_u64(headers, "x-ratelimit-limit-requests"),
            remaining_requests: parse_u64(headers, "x-ratelimit-remaining-requests"),
            reset_requests_secs: parse_u64(headers, "x-ratelimit-reset-requests"),
            limit_tokens: parse_u64(headers, "x-ratelimit-limit-tokens"),
            remaining_tokens: parse_u64(headers, "x-ratelimit-remaining-tokens"),
            reset_tokens_secs: parse_u64(headers, "x-ratelimit-reset-tokens"),
            processing_ms: parse_u64(headers, "openai-processing-ms"),
            request_id: headers.get("x-request-id").cloned(),
            observed_at: Utc::now(),
        };

        let mut state = self.state.lock();
        state.last = Some(snapshot.clone());
        if let Some(tenant) = &tenant_id {
            let history = state.by_tenant.entry(tenant.clone()).or_default();
            history.push_back(snapshot.clone());
            while history.len() > HISTORY_CAP {
                history.pop_front();
            }
        }
        snapshot
    }

    pub fn last_snapshot(&self) -> Option<RateLimitSnapshot> {
        self.state.lock().last.clone()
    }

    pub fn tenant_summaries(&self) -> Vec<TenantRateLimitSummary> {
        let state = self.state.lock();
        let mut tenant_ids: Vec<&String> = state.by_tenant.keys().collect();
        tenant_ids.sort();

        tenant_ids
            .into_iter()
            .filter_map(|tenant_id| {
                let history = state.by_tenant.get(tenant_id)?;
                let latest = history.back()?.clone();

                let processing_samples: Vec<u64> =
                    history.iter().filter_map(|s| s.processing_ms).collect();
                let mean_processing_ms = if processing_samples.is_empty() {
                    0.0
                } else {
                    processing_samples.iter().sum::<u64>() as f64 / processing_samples.len() as f64
                };

                let remaining_requests_pct = match (latest.remaining_requests, latest.limit_requests) {
                    (Some(remaining), Some(limit)) if limit > 0 => Some(remaining as f64 / limit as f64),
                    _ => None,
                };
                let remaining_tokens_pct = match (latest.remaining_tokens, latest.limit_tokens) {
                    (Some(remaining), Some(limit)) if limit > 0 => Some(remaining as f64 / limit as f64),
                    _ => None,
                };

                let alert = if remaining_requests_pct.map(|pct| pct <= 0.1).unwrap_or(false) {
                    Some(RateLimitAlert::Requests)
                } else if remaining_tokens_pct.map(|pct| pct <= 0.1).unwrap_or(false) {
                    Some(RateLimitAlert::Tokens)
                } else {
                    None
                };

                Some(TenantRateLimitSummary {
                    tenant_id: tenant_id.clone(),
                    latest,
                    mean_processing_ms,
                    remaining_requests_pct,
                    remaining_tokens_pct,
                    alert,
                })
            })
            .collect()
    }
}

impl Default for RateLimitTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_u64(headers: &ProviderHeaders, key: &str) -> Option<u64> {
    headers.get(key).and_then(|v| v.trim().parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> ProviderHeaders {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn capture_parses_recognized_headers() {
        let tracker = RateLimitTracker::new();
        let snapshot = tracker.capture(
            &headers(&[
                ("x-ratelimit-limit-requests", "100"),
                ("x-ratelimit-remaining-requests", "5"),
                ("x-request-id", "req_123"),
            ]),
            Some("tenant-a".to_string()),
        );
        assert_eq!(snapshot.limit_requests, Some(100));
        assert_eq!(snapshot.remaining_requests, Some(5));
        assert_eq!(snapshot.request_id.as_deref(), Some("req_123"));
    }

    #[test]
    fn low_remaining_requests_raises_requests_alert() {
        let tracker = RateLimitTracker::new();
        tracker.capture(
            &headers(&[
                ("x-ratelimit-limit-requests", "100"),
                ("x-ratelimit-remaining-requests", "5"),
            ]),
            Some("tenant-a".to_string()),
        );
        let summaries = tracker.tenant_summaries();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].alert, Some(RateLimitAlert::Requests));
    }

    #[test]
    fn history_window_caps_at_fifty() {
        let tracker = RateLimitTracker::new();
        for i in 0..60 {
            tracker.capture(
                &headers(&[("x-ratelimit-remaining-requests", &i.to_string())]),
                Some("tenant-a".to_string()),
            );
        }
        let state = tracker.state.lock();
        assert_eq!(state.by_tenant.get("tenant-a").unwrap().len(), HISTORY_CAP);
    }

    #[test]
    fn summaries_sort_by_tenant_id() {
        let tracker = RateLimitTracker::new();
        tracker.capture(&headers(&[]), Some("zzz".to_string()));
        tracker.capture(&headers(&[]), Some("aaa".to_string()));
        let summaries = tracker.tenant_summaries();
        assert_eq!(summaries[0].tenant_id, "aaa");
        assert_eq!(summaries[1].tenant_id, "zzz");
    }
}
