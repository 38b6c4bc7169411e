use crate::config::ServerConfig;
use std::sync::Arc;

/// Shared state handed to every server request.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
}

impl AppContext {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}
