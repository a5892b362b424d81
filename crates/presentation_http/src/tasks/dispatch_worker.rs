//! Dispatch worker
//!
//! Drains the update queue filled by the webhook endpoint and runs the
//! dispatcher on each update. Keeping this off the request path means
//! slow handlers delay later updates, never the provider acknowledgment.

use dispatch::Dispatcher;
use domain::Update;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Spawn the worker; it runs until every queue sender is dropped.
pub fn spawn_dispatch_worker<C: Send + Sync + 'static>(
    dispatcher: Dispatcher<C>,
    mut queue_rx: mpsc::Receiver<Update>,
) -> JoinHandle<()> {
    info!("Starting webhook dispatch worker");
    tokio::spawn(async move {
        while let Some(update) = queue_rx.recv().await {
            let handled = dispatcher.dispatch(update).await;
            debug!(handled, "Update dispatched");
        }
        info!("Dispatch worker stopped, queue closed");
    })
}
