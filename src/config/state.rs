// Application state module
// Immutable configuration plus lock-free cached flags

use std::sync::atomic::{AtomicBool, Ordering};

use super::types::Config;

/// Application state shared by every connection
pub struct AppState {
    pub config: Config,

    // Cached config values for fast access without locks
    cached_access_log: AtomicBool,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            cached_access_log: AtomicBool::new(config.logging.access_log),
        }
    }

    pub fn access_log_enabled(&self) -> bool {
        self.cached_access_log.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub fn set_access_log(&self, enabled: bool) {
        self.cached_access_log.store(enabled, Ordering::Relaxed);
    }
}
