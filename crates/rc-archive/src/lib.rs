mod export;
mod fs;
mod memory;
mod rollback;
mod traits;
mod types;

pub use fs::FsArchive;
pub use memory::InMemoryArchive;
pub use traits::{
    Archive, ArchiveCapabilities, DelegationAware, Exportable, ModerationAware, Prunable,
    Rollbackable, SafetyAware,
};
pub use types::{DelegationUpdate, RecordEventInput, RollbackTarget, SafetyUpdate, StartRunInput};
