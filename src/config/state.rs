// Application state module
// Everything a request handler needs, built once at startup

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use super::types::Config;
use crate::gateway::Gateway;

/// Application state
pub struct AppState {
    pub config: Config,
    pub gateway: Arc<Gateway>,

    // Cached config values for fast access on the hot path
    pub cached_access_log: AtomicBool,
}

impl AppState {
    pub fn new(config: Config, gateway: Arc<Gateway>) -> Self {
        let cached_access_log = AtomicBool::new(config.logging.access_log);
        Self {
            config,
            gateway,
            cached_access_log,
        }
    }
}
