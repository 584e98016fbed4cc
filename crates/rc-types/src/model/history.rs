use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryStrategy {
    Vendor,
    Replay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Truncation {
    Auto,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryPreference {
    PreferReplay,
    PreferVendor,
}

/// Inputs to the History Planner.
#[derive(Debug, Clone)]
pub struct HistoryInput {
    pub estimated_tokens: u64,
    pub event_count: u64,
    pub truncation: Truncation,
    pub preference: Option<HistoryPreference>,
}

/// Decision produced by the History Planner: how to assemble prompt
/// history for the upcoming request.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryPlan {
    pub strategy: HistoryStrategy,
    pub trimmed_events: u64,
    pub warnings: Vec<String>,
}
