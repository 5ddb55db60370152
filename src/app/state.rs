//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::playback::ViewRegistry;
use crate::stream::StreamClient;
use crate::util::rate_limit::{create_limiter, Limiter};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub views: Arc<ViewRegistry>,
    pub engine: StreamClient,
    pub ingest_limiter: Arc<Limiter>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // One registry for every mounted view
        let views = Arc::new(ViewRegistry::new(config.render_fps));

        // Engine stream follower
        let engine = StreamClient::new(config.engine_base_url.clone());

        let ingest_limiter = create_limiter(config.ingest_rate_limit);

        Self {
            config,
            views,
            engine,
            ingest_limiter,
        }
    }
}
