//! Event system for cross-component notification
//!
//! The [`EventBus`] decouples publishers from observers inside one process.
//! Subscribers register against an exact event name or a `*` wildcard pattern
//! and receive every matching [`Event`] once. Handlers may be held strongly or
//! weakly; weak subscriptions disappear when their handler is dropped.
//!
//! # Example
//!
//! ```rust,no_run
//! use conductor_core::events::{handler_fn, Event, EventBus};
//! use serde_json::json;
//!
//! # async fn example() -> conductor_core::error::Result<()> {
//! let bus = EventBus::new();
//! bus.subscribe("tool.*", handler_fn(|event| async move {
//!     println!("{} -> {:?}", event.name(), event.data());
//!     Ok(())
//! }))?;
//!
//! bus.start().await;
//! bus.emit(Event::new("tool.execution.started")?.with_data("tool_name", json!("search")))
//!     .await;
//! bus.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! Event names emitted by the runtime itself:
//!
//! | Event | Publisher |
//! |-------|-----------|
//! | `executor.started` / `executor.stopped` | tool executor |
//! | `tool.execution.started` / `completed` / `failed` | tool executor |
//! | `metrics.recorded` | metrics middleware (optional) |

mod bus;
mod error;
mod event;
mod handler;
mod pattern;


pub use bus::{
    DEFAULT_HISTORY_CAPACITY, EventBus, EventBusConfig, EventBusStats, SubscriptionId,
};
pub use error::EventError;
pub use event::Event;
pub use handler::{EventHandler, FnHandler, HandlerResult, handler_fn};
pub use pattern::EventPattern;
