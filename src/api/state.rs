use std::sync::Arc;

use crate::services::MatchPipeline;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<MatchPipeline>,
}

impl AppState {
    pub fn new(pipeline: MatchPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}
