//! Shared state for handlers.

use std::sync::Arc;

use review_pipeline::ReviewRuntime;
use task_info_store::TtlMap;

use crate::config::ListenerConfig;

pub struct AppState {
    pub config: ListenerConfig,
    /// Engine handles: broker, task-info store, database, diff providers.
    pub runtime: Arc<ReviewRuntime>,
    /// Payload → running job id, so a re-run revokes the previous job.
    pub active_jobs: TtlMap,
}

impl AppState {
    pub fn new(config: ListenerConfig, runtime: Arc<ReviewRuntime>) -> Arc<Self> {
        Arc::new(Self {
            config,
            runtime,
            active_jobs: TtlMap::new(),
        })
    }
}
