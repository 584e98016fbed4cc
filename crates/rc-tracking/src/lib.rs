pub mod delegation;
pub mod incident;
pub mod ratelimit;

pub use delegation::DelegationTracker;
pub use incident::{IncidentLog, ResolveInput};
pub use ratelimit::RateLimitTracker;
