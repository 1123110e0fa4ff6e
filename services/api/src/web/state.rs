//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use crate::web::broadcast::Broadcaster;
use santri_core::ports::{Clock, DatabaseService};
use santri_core::ScanPolicy;
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub clock: Arc<dyn Clock>,
    pub broadcaster: Arc<Broadcaster>,
}

impl AppState {
    pub fn new(db: Arc<dyn DatabaseService>, config: Arc<Config>, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            config,
            clock,
            broadcaster: Arc::new(Broadcaster::new()),
        }
    }

    pub fn scan_policy(&self) -> ScanPolicy {
        self.config.scan_policy()
    }
}
