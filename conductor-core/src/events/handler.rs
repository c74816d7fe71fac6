//! Event handler trait and closure adapter

use super::event::Event;
use crate::error::Result;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// Result type for handlers
pub type HandlerResult = Result<()>;

/// Trait for event handlers
///
/// Handlers must not rely on running before or after other handlers of the
/// same event. An error returned here is logged by the bus and goes no
/// further.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle an event
    async fn handle(&self, event: &Event) -> HandlerResult;
}

/// Adapter turning an async closure into an [`EventHandler`]
pub struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(Event) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    async fn handle(&self, event: &Event) -> HandlerResult {
        (self.f)(event.clone()).await
    }
}

/// Wrap an async closure as a shareable handler
///
/// ```rust,no_run
/// use conductor_core::events::{handler_fn, EventBus};
///
/// # async fn demo(bus: &EventBus) -> conductor_core::error::Result<()> {
/// bus.subscribe("tool.*", handler_fn(|event| async move {
///     tracing::info!(event = %event.name(), "observed");
///     Ok(())
/// }))?;
/// # Ok(())
/// # }
/// ```
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn EventHandler>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(FnHandler { f })
}
