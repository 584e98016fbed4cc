use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStrategy {
    Vendor,
    Stateless,
}

/// Determines whether the upstream conversation identifier is persisted and
/// reused across runs for a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationPolicy {
    pub strategy: ConversationStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,
}

impl Default for ConversationPolicy {
    fn default() -> Self {
        Self {
            strategy: ConversationStrategy::Stateless,
            ttl_seconds: None,
        }
    }
}

/// Outcome of Conversation State Manager negotiation for a single run.
#[derive(Debug, Clone, Default)]
pub struct ConversationContext {
    pub conversation: Option<String>,
    pub store_flag: bool,
    pub previous_response_id: Option<String>,
}
