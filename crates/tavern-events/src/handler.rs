//! The subscriber interface.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use tavern_types::DomainEvent;

/// A subscriber failed to handle an event.
///
/// The bus logs these and records them in the publish outcome; they never
/// reach the publisher as an `Err`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    /// What went wrong.
    pub message: String,
}

impl HandlerError {
    /// Create a handler error with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Receives events from the bus.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle one event.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] if the subscriber could not process the
    /// event. Other subscribers are unaffected.
    async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError>;
}

#[async_trait]
impl<T: EventHandler + ?Sized> EventHandler for Arc<T> {
    async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError> {
        (**self).handle(event).await
    }
}

/// Adapter turning an async closure into an [`EventHandler`].
///
/// The closure receives its own copy of the event.
pub struct FnHandler<F> {
    func: F,
}

impl<F> core::fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(DomainEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError> {
        (self.func)(event.clone()).await
    }
}

/// Wrap `func` as an [`EventHandler`].
pub const fn handler_fn<F, Fut>(func: F) -> FnHandler<F>
where
    F: Fn(DomainEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    FnHandler { func }
}
