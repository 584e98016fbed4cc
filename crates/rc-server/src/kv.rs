//! In-memory `ConversationKv` backend for the vendor conversation policy.
//! The same role `StubProviderClient` plays for the provider contract: an
//! ambient, dependency-free stand-in that makes every documented config
//! value actually work out of the box, not a vendor integration.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rc_types::kv::ConversationKv;
use rc_types::Result;

struct Entry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct InMemoryConversationKv {
    data: Mutex<HashMap<String, Entry>>,
}

#[async_trait::async_trait]
impl ConversationKv for InMemoryConversationKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut data = self.data.lock();
        let Some(entry) = data.get(key) else {
            return Ok(None);
        };
        if entry.expires_at.map(|at| at <= Utc::now()).unwrap_or(false) {
            data.remove(key);
            return Ok(None);
        }
        Ok(Some(entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<()> {
        let expires_at = ttl_seconds.map(|secs| Utc::now() + chrono::Duration::seconds(secs as i64));
        self.data.lock().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.data.lock().remove(key);
        Ok(())
    }
}
