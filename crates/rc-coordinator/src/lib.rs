mod coordinator;
mod operations;
mod types;

pub use coordinator::{status_key, RunCoordinator};
pub use operations::{OperationsSummary, OperationsService, TenantRollup};
pub use types::{SpeechOptions, StartRunOptions, StartRunOutcome};
