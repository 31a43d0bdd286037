// state.rs
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::Config;
use crate::store::PollStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PollStore>,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn PollStore>, clock: Arc<dyn Clock>, config: Config) -> Self {
        Self {
            store,
            clock,
            config: Arc::new(config),
        }
    }
}
