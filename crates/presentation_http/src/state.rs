//! Application state shared across handlers

use std::sync::Arc;

use domain::Update;
use tokio::sync::mpsc;

use crate::config::ServerConfig;

/// Shared endpoint state.
///
/// The endpoint never dispatches inline; parsed updates go through
/// `queue_tx` to the dispatch worker so the provider acknowledgment is
/// independent of handler execution time.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub queue_tx: mpsc::Sender<Update>,
}
