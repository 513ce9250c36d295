use std::sync::Arc;

use crate::cache::ResponseCache;
use crate::channel::ChannelRecord;
use crate::config::Config;
use crate::highlight::{HeuristicHighlighter, Highlighter};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub cache: Arc<ResponseCache<ChannelRecord>>,
    pub highlighter: Arc<dyn Highlighter>,
}

impl AppState {
    /// Production wiring: default cache policy, heuristic highlighter.
    pub fn new(config: Config) -> Self {
        Self::with_highlighter(config, Arc::new(HeuristicHighlighter))
    }

    pub fn with_highlighter(config: Config, highlighter: Arc<dyn Highlighter>) -> Self {
        Self {
            config: Arc::new(config),
            cache: Arc::new(ResponseCache::with_defaults()),
            highlighter,
        }
    }
}
