use rc_types::kv::ConversationKv;
use rc_types::model::{ConversationContext, ConversationPolicy, ConversationStrategy};
use rc_types::{Error, Result};

pub struct ConversationInput {
    pub tenant_id: String,
    pub run_id: String,
    pub existing_conversation_id: Option<String>,
    pub previous_response_id: Option<String>,
    pub policy: ConversationPolicy,
}

/// The negotiated context plus, for the vendor strategy, the KV key a
/// caller should delete when the run ends abnormally. A plain key rather
/// than a boxed cleanup closure: the coordinator already owns the KV
/// handle, so it can call `kv.delete(&cleanup_key)` itself.
pub struct PreparedConversation {
    pub context: ConversationContext,
    pub cleanup_key: Option<String>,
}

fn tenant_key(tenant_id: &str) -> String {
    format!("conversation:{tenant_id}")
}

/// Negotiates whether a run's conversation id is vendor-managed or
/// stateless, per spec.md §4.7.
pub struct ConversationStateManager;

impl ConversationStateManager {
    pub async fn prepare(
        &self,
        kv: Option<&dyn ConversationKv>,
        input: ConversationInput,
    ) -> Result<PreparedConversation> {
        match input.policy.strategy {
            ConversationStrategy::Stateless => Ok(PreparedConversation {
                context: ConversationContext {
                    conversation: None,
                    store_flag: false,
                    previous_response_id: input.previous_response_id,
                },
                cleanup_key: None,
            }),
            ConversationStrategy::Vendor => {
                let kv = kv.ok_or_else(|| {
                    Error::Unsupported("conversation kv required for vendor policy".to_string())
                })?;
                let key = tenant_key(&input.tenant_id);
                let conversation = match kv.get(&key).await? {
                    Some(existing) => existing,
                    None => {
                        let generated = format!("conv_{}", input.run_id);
                        kv.set(&key, &generated, input.policy.ttl_seconds).await?;
                        generated
                    }
                };
                Ok(PreparedConversation {
                    context: ConversationContext {
                        conversation: Some(conversation),
                        store_flag: true,
                        previous_response_id: input.previous_response_id,
                    },
                    cleanup_key: Some(key),
                })
            }
        }
    }
}

impl Default for ConversationStateManager {
    fn default() -> Self {
        Self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryKv {
        data: Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl ConversationKv for MemoryKv {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            Ok(self.data.lock().get(key).cloned())
        }
        async fn set(&self, key: &str, value: &str, _ttl_seconds: Option<u64>) -> Result<()> {
            self.data.lock().insert(key.to_string(), value.to_string());
            Ok(())
        }
        async fn delete(&self, key: &str) -> Result<()> {
            self.data.lock().remove(key);
            Ok(())
        }
    }

    #[tokio::test]
    async fn stateless_policy_has_no_side_effects() {
        let manager = ConversationStateManager;
        let prepared = manager
            .prepare(
                None,
                ConversationInput {
                    tenant_id: "t1".to_string(),
                    run_id: "r1".to_string(),
                    existing_conversation_id: None,
                    previous_response_id: Some("resp_0".to_string()),
                    policy: ConversationPolicy {
                        strategy: ConversationStrategy::Stateless,
                        ttl_seconds: None,
                    },
                },
            )
            .await
            .unwrap();
        assert!(!prepared.context.store_flag);
        assert_eq!(prepared.context.previous_response_id.as_deref(), Some("resp_0"));
        assert!(prepared.cleanup_key.is_none());
    }

    #[tokio::test]
    async fn vendor_policy_generates_and_reuses_conversation_id() {
        let kv = MemoryKv::default();
        let manager = ConversationStateManager;
        let policy = ConversationPolicy {
            strategy: ConversationStrategy::Vendor,
            ttl_seconds: Some(3600),
        };
        let first = manager
            .prepare(
                Some(&kv),
                ConversationInput {
                    tenant_id: "t1".to_string(),
                    run_id: "r1".to_string(),
                    existing_conversation_id: None,
                    previous_response_id: None,
                    policy: policy.clone(),
                },
            )
            .await
            .unwrap();
        assert_eq!(first.context.conversation.as_deref(), Some("conv_r1"));
        assert!(first.context.store_flag);

        let second = manager
            .prepare(
                Some(&kv),
                ConversationInput {
                    tenant_id: "t1".to_string(),
                    run_id: "r2".to_string(),
                    existing_conversation_id: None,
                    previous_response_id: None,
                    policy,
                },
            )
            .await
            .unwrap();
        assert_eq!(second.context.conversation.as_deref(), Some("conv_r1"));
    }
}
