//! Backing store abstraction for the Conversation State Manager's vendor
//! policy: "any KV satisfying get/set/delete" per spec.md §4.7.

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait ConversationKv: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}
