use std::sync::Arc;

use rc_coordinator::{OperationsService, RunCoordinator};

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub coordinator: Arc<RunCoordinator>,
    pub ops: Arc<OperationsService>,
    pub admin_token_hash: Option<Vec<u8>>,
}
