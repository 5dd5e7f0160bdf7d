use std::sync::Arc;

use crate::config::EngineConfig;
use crate::dispatcher::Dispatcher;

/// Shared by every request handler. Holds no connections: each request opens
/// and closes its own session.
pub struct AppState {
    pub dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(engines: &EngineConfig) -> Arc<Self> {
        Self::with_dispatcher(Dispatcher::with_defaults(engines))
    }

    pub fn with_dispatcher(dispatcher: Dispatcher) -> Arc<Self> {
        Arc::new(Self { dispatcher })
    }
}
