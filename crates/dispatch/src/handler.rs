//! Handler trait and closure adapter

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use domain::Update;
use thiserror::Error;

/// A failure reported by a handler callback.
///
/// Handler failures are contained by the dispatcher: they are logged with
/// the registration identity and never abort the dispatch loop or the
/// HTTP acknowledgment.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Wrap any error type, keeping its display form.
    pub fn from_source<E: std::fmt::Display>(source: E) -> Self {
        Self {
            message: source.to_string(),
        }
    }
}

/// A callback bound to an update kind via a [`Registration`].
///
/// `C` is the shared outbound client handlers use to reply; the dispatcher
/// passes the same `Arc<C>` to every invocation.
///
/// [`Registration`]: crate::registry::Registration
#[async_trait]
pub trait Handler<C>: Send + Sync {
    async fn handle(&self, client: Arc<C>, update: Update) -> Result<(), HandlerError>;

    /// Name used when logging failures of this handler.
    fn name(&self) -> &str {
        "handler"
    }
}

/// Adapter that lets a plain async closure act as a [`Handler`].
pub struct FnHandler<F> {
    name: String,
    func: F,
}

impl<F> std::fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnHandler").field("name", &self.name).finish()
    }
}

/// Wrap an async closure as a named handler.
///
/// ```ignore
/// let echo = handler_fn("echo", |client: Arc<WhatsAppClient>, update: Update| async move {
///     if let Some(text) = update.text() {
///         client.send_text(&update.sender, text).await.map_err(HandlerError::from_source)?;
///     }
///     Ok(())
/// });
/// ```
pub fn handler_fn<F>(name: impl Into<String>, func: F) -> FnHandler<F> {
    FnHandler {
        name: name.into(),
        func,
    }
}

#[async_trait]
impl<C, F, Fut> Handler<C> for FnHandler<F>
where
    C: Send + Sync + 'static,
    F: Fn(Arc<C>, Update) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn handle(&self, client: Arc<C>, update: Update) -> Result<(), HandlerError> {
        (self.func)(client, update).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
