//! Shared application state

use crate::agents::Services;
use crate::auth::TokenService;
use std::sync::Arc;
use std::time::Instant;

/// State shared by every handler
pub struct AppState {
    pub services: Services,
    pub tokens: TokenService,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(services: Services, tokens: TokenService) -> Arc<Self> {
        Arc::new(Self {
            services,
            tokens,
            start_time: Instant::now(),
        })
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
