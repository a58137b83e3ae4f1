//! Shared application state for HTTP handlers

use crate::gateway::AskGateway;

/// State handed to every handler
#[derive(Debug, Clone)]
pub struct AppState {
    /// Gateway of the endpoint node serving this listener
    pub gateway: AskGateway,
}

impl AppState {
    pub fn new(gateway: AskGateway) -> Self {
        Self { gateway }
    }
}
