use std::sync::Arc;

use tap_core::config::ProviderDescription;
use tap_core::ActionService;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ActionService>,
    pub provider: Arc<ProviderDescription>,
}

impl AppState {
    pub fn new(service: ActionService, provider: ProviderDescription) -> Self {
        Self {
            service: Arc::new(service),
            provider: Arc::new(provider),
        }
    }
}
