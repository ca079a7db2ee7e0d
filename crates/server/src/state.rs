use std::sync::Arc;
use ticketsync_core::{Authenticator, Config, SanitizedConfig, WorkflowDispatcher};

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    dispatcher: WorkflowDispatcher,
}

impl AppState {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        dispatcher: WorkflowDispatcher,
    ) -> Self {
        Self {
            config,
            authenticator,
            dispatcher,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn dispatcher(&self) -> &WorkflowDispatcher {
        &self.dispatcher
    }
}
