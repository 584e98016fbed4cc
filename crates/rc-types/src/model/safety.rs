use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Per-run moderation state. `refusal_count` increases monotonically within
/// a run's lifetime except via rollback.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SafetySnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashed_identifier: Option<String>,
    #[serde(default)]
    pub refusal_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_refusal_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Vec<ModeratorNote>,
}

impl SafetySnapshot {
    /// Build a snapshot carrying the SHA-256 hash of a raw safety
    /// identifier, hex-encoded. The raw identifier itself is never stored.
    pub fn with_identifier(raw_identifier: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(raw_identifier.as_bytes());
        let digest = hasher.finalize();
        Self {
            hashed_identifier: Some(hex::encode(digest)),
            ..Default::default()
        }
    }

    pub fn record_refusal(&mut self, at: DateTime<Utc>) {
        self.refusal_count += 1;
        self.last_refusal_at = Some(at);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Approved,
    Escalated,
    Blocked,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeratorNote {
    pub reviewer: String,
    pub note: String,
    pub disposition: Disposition,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_identifier_is_deterministic_and_opaque() {
        let snap = SafetySnapshot::with_identifier("user-123");
        let hash = snap.hashed_identifier.unwrap();
        assert_eq!(hash.len(), 64);
        assert_ne!(hash, "user-123");
        let snap2 = SafetySnapshot::with_identifier("user-123");
        assert_eq!(snap2.hashed_identifier.unwrap(), hash);
    }

    #[test]
    fn record_refusal_increments_monotonically() {
        let mut snap = SafetySnapshot::default();
        let t1 = Utc::now();
        snap.record_refusal(t1);
        snap.record_refusal(t1);
        assert_eq!(snap.refusal_count, 2);
        assert_eq!(snap.last_refusal_at, Some(t1));
    }
}
