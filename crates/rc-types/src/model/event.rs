use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single provider-emitted message with a monotonically increasing
/// per-run sequence. Append-only: never mutated once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub run_id: String,
    pub sequence: u64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

/// A truncated view of a run's timeline, as returned by `SnapshotAt` and
/// `Rollback`.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineSnapshot {
    pub run_id: String,
    pub events: Vec<EventRecord>,
}
