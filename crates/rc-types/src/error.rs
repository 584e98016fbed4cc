/// Shared error taxonomy used across every Responses Run Coordinator crate.
///
/// Mirrors spec.md §7: validation and conflict errors are raised directly to
/// the caller and never mutate state; upstream/IO failures propagate so the
/// caller can retry.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("run already exists: {0}")]
    AlreadyExists(String),

    #[error("sequence already recorded: run={run_id} sequence={sequence}")]
    SequenceAlreadyRecorded { run_id: String, sequence: u64 },

    #[error("stale sequence: run={run_id} sequence={sequence} last={last}")]
    StaleSequence {
        run_id: String,
        sequence: u64,
        last: u64,
    },

    #[error("invalid sequence: {0}")]
    InvalidSequence(String),

    #[error("already registered: {0}")]
    AlreadyRegistered(String),

    #[error("unknown builtin tool: {0}")]
    UnknownBuiltin(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("unsupported capability: {0}")]
    Unsupported(String),

    #[error("upstream failure: {0}")]
    UpstreamFailure(String),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
