//! Update dispatcher
//!
//! One dispatch is a single pass over a registry snapshot: filters are
//! evaluated in sorted order, matching handlers run sequentially to
//! completion, handler failures are logged and contained, and a matched
//! blocking registration stops propagation. The dispatcher keeps no state
//! between dispatches.

use std::sync::Arc;

use domain::Update;
use tracing::{debug, error, instrument};

use crate::registry::HandlerRegistry;

/// Dispatches parsed updates to matching registrations.
///
/// Holds the registry and the shared outbound client; the same `Arc<C>`
/// is handed to every handler invocation.
pub struct Dispatcher<C> {
    registry: Arc<HandlerRegistry<C>>,
    client: Arc<C>,
}

impl<C> Clone for Dispatcher<C> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            client: Arc::clone(&self.client),
        }
    }
}

impl<C> std::fmt::Debug for Dispatcher<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .finish()
    }
}

impl<C: Send + Sync + 'static> Dispatcher<C> {
    pub fn new(registry: Arc<HandlerRegistry<C>>, client: Arc<C>) -> Self {
        Self { registry, client }
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry<C>> {
        &self.registry
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Run all matching handlers for `update`, in `(priority, insertion)`
    /// order, each awaited to completion before the next starts.
    ///
    /// Returns the number of handlers that ran.
    #[instrument(skip(self, update), fields(kind = %update.kind()))]
    pub async fn dispatch(&self, update: Update) -> usize {
        let snapshot = self.registry.snapshot(update.kind());
        let mut handled = 0;

        for registration in snapshot.iter() {
            if !registration.filter().matches(&update) {
                continue;
            }
            handled += 1;

            if let Err(e) = registration
                .handler()
                .handle(Arc::clone(&self.client), update.clone())
                .await
            {
                error!(
                    handler = registration.name(),
                    id = ?registration.id(),
                    error = %e,
                    "Handler failed; continuing dispatch"
                );
            }

            if !registration.continue_propagation() {
                debug!(
                    handler = registration.name(),
                    "Blocking registration matched, stopping dispatch"
                );
                break;
            }
        }

        debug!(handled, "Dispatch finished");
        handled
    }
}
