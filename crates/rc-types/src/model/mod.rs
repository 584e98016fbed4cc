pub mod conversation;
pub mod delegation;
pub mod event;
pub mod history;
pub mod incident;
pub mod ratelimit;
pub mod run;
pub mod safety;

pub use conversation::{ConversationContext, ConversationPolicy, ConversationStrategy};
pub use delegation::{DelegationRecord, DelegationStatus};
pub use event::{EventRecord, TimelineSnapshot};
pub use history::{HistoryInput, HistoryPlan, HistoryPreference, HistoryStrategy, Truncation};
pub use incident::{
    Disposition as IncidentDisposition, IncidentInput, IncidentKind, IncidentRecord,
    IncidentStatus, Resolution,
};
pub use ratelimit::{RateLimitAlert, RateLimitSnapshot, TenantRateLimitSummary};
pub use run::{RunRecord, RunStatus, RunSummary};
pub use safety::{Disposition as ModerationDisposition, ModeratorNote, SafetySnapshot};
