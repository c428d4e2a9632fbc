//! Shared context for API handlers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::core_state::CoreState;
use crate::pipeline::CandidateAdapters;

/// Everything a handler needs, injected via `Router::with_state`.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
    pub config: AppConfig,
    pub adapters: CandidateAdapters,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>, config: AppConfig, adapters: CandidateAdapters) -> Self {
        Self {
            core,
            config,
            adapters,
        }
    }
}
