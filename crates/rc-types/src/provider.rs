//! The opaque upstream model provider contract.
//!
//! The core never speaks the provider's wire schema directly — it depends
//! only on this trait, analogous to how the coordinator's sibling crates
//! depend on `LlmProvider` rather than any one vendor's HTTP shape. A stub
//! implementation (deterministic, no network) and a thin HTTP
//! implementation both live in `rc-server`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A provider-agnostic run request. Only the fields the core inspects are
/// named; anything else is opaque JSON on `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderRequest {
    pub model: String,
    pub input: serde_json::Value,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub tools: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tool_calls: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<String>,
    #[serde(default)]
    pub store: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_response_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety_identifier: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    Completed,
    Failed,
    Cancelled,
    Incomplete,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderUsage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

/// A provider-agnostic run result. `output` is a sequence of opaque
/// provider items; the Streaming Buffer's replay path walks it to seed
/// itself without a live event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResult {
    pub id: String,
    pub status: ProviderStatus,
    #[serde(default)]
    pub output: Vec<serde_json::Value>,
    #[serde(default)]
    pub usage: ProviderUsage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Case-insensitive-by-convention header map the provider returns alongside
/// its result; §4.4 recognizes a fixed set of names out of this map.
pub type ProviderHeaders = HashMap<String, String>;

/// `Create(Request) -> (Result, Headers)`, per spec.md §6.
#[async_trait::async_trait]
pub trait ProviderClient: Send + Sync {
    async fn create(
        &self,
        request: &ProviderRequest,
    ) -> Result<(ProviderResult, ProviderHeaders)>;
}
