//! In-process asynchronous event bus
//!
//! Events submitted with [`EventBus::emit`] go through an unbounded queue that
//! is drained by a single background task, so queued events are dispatched in
//! submission order. [`EventBus::emit_sync`] skips the queue and waits for the
//! matched handlers. Handlers matched by the same event run concurrently, each
//! on its own task, and their failures (including panics) are logged and
//! contained.

use super::error::EventError;
use super::event::Event;
use super::handler::EventHandler;
use super::pattern::EventPattern;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Default number of events retained for introspection
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Event bus configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventBusConfig {
    /// Maximum number of processed events kept in history
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl EventBusConfig {
    /// Set history capacity
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }
}

/// Identifier returned by every subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

enum HandlerRef {
    Strong(Arc<dyn EventHandler>),
    Weak(Weak<dyn EventHandler>),
}

impl HandlerRef {
    fn upgrade(&self) -> Option<Arc<dyn EventHandler>> {
        match self {
            HandlerRef::Strong(handler) => Some(handler.clone()),
            HandlerRef::Weak(handler) => handler.upgrade(),
        }
    }

    fn is_dead(&self) -> bool {
        match self {
            HandlerRef::Strong(_) => false,
            HandlerRef::Weak(handler) => handler.strong_count() == 0,
        }
    }

    fn points_to(&self, target: *const ()) -> bool {
        match self {
            HandlerRef::Strong(handler) => Arc::as_ptr(handler) as *const () == target,
            HandlerRef::Weak(handler) => handler.as_ptr() as *const () == target,
        }
    }
}

struct Subscription {
    id: SubscriptionId,
    pattern: EventPattern,
    handler: HandlerRef,
}

/// Snapshot of bus state
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventBusStats {
    /// Background worker is running
    pub running: bool,
    /// Events waiting in the queue
    pub queued: usize,
    /// Events retained in history
    pub history_size: usize,
    /// Strong subscriptions per pattern
    pub handler_counts: HashMap<String, usize>,
    /// Live weak subscriptions per pattern
    pub weak_handler_counts: HashMap<String, usize>,
}

struct BusShared {
    subscriptions: RwLock<Vec<Subscription>>,
    history: Mutex<VecDeque<Arc<Event>>>,
    history_capacity: usize,
    queued: AtomicUsize,
}

impl BusShared {
    fn record(&self, event: &Arc<Event>) {
        if self.history_capacity == 0 {
            return;
        }
        let mut history = self.history.lock();
        history.push_back(event.clone());
        while history.len() > self.history_capacity {
            history.pop_front();
        }
    }

    fn matching_handlers(&self, event_name: &str) -> Vec<Arc<dyn EventHandler>> {
        let mut handlers = Vec::new();
        let mut found_dead = false;
        {
            let subscriptions = self.subscriptions.read();
            for subscription in subscriptions.iter() {
                if !subscription.pattern.matches(event_name) {
                    continue;
                }
                match subscription.handler.upgrade() {
                    Some(handler) => handlers.push(handler),
                    None => found_dead = true,
                }
            }
        }

        if found_dead {
            let mut subscriptions = self.subscriptions.write();
            let before = subscriptions.len();
            subscriptions.retain(|s| !s.handler.is_dead());
            tracing::debug!(
                pruned = before - subscriptions.len(),
                "Pruned dead weak subscriptions"
            );
        }

        handlers
    }

    async fn dispatch(&self, event: Event) {
        let event = Arc::new(event);
        self.record(&event);

        let handlers = self.matching_handlers(event.name());
        if handlers.is_empty() {
            tracing::debug!(event = %event.name(), "No handlers for event");
            return;
        }

        let count = handlers.len();
        let tasks = handlers.into_iter().map(|handler| {
            let event = event.clone();
            tokio::spawn(async move { handler.handle(&event).await })
        });

        for outcome in join_all(tasks).await {
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(event = %event.name(), error = %e, "Event handler failed");
                }
                Err(e) => {
                    tracing::error!(event = %event.name(), error = %e, "Event handler panicked");
                }
            }
        }

        tracing::debug!(event = %event.name(), handlers = count, "Event processed");
    }
}

struct Worker {
    sender: mpsc::UnboundedSender<Event>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Single-process publish/subscribe dispatcher
pub struct EventBus {
    shared: Arc<BusShared>,
    worker: Mutex<Option<Worker>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("running", &self.is_running())
            .field("subscriptions", &self.shared.subscriptions.read().len())
            .field("history_capacity", &self.shared.history_capacity)
            .finish()
    }
}

impl EventBus {
    /// Create a bus with default configuration
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// Create a bus with custom configuration
    pub fn with_config(config: EventBusConfig) -> Self {
        Self {
            shared: Arc::new(BusShared {
                subscriptions: RwLock::new(Vec::new()),
                history: Mutex::new(VecDeque::new()),
                history_capacity: config.history_capacity,
                queued: AtomicUsize::new(0),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Start the background processing task; no-op if already running
    pub async fn start(&self) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return;
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_worker(self.shared.clone(), receiver, cancel.clone()));
        *worker = Some(Worker {
            sender,
            cancel,
            task,
        });
        tracing::info!("Event bus started");
    }

    /// Stop the background task, waiting for the event in flight to finish
    ///
    /// Events still queued when the bus stops are dropped.
    pub async fn stop(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };

        worker.cancel.cancel();
        drop(worker.sender);
        if let Err(e) = worker.task.await {
            tracing::error!(error = %e, "Event bus worker terminated abnormally");
        }

        let dropped = self.shared.queued.swap(0, Ordering::SeqCst);
        if dropped > 0 {
            tracing::warn!(dropped, "Event bus stopped with undelivered events");
        }
        tracing::info!("Event bus stopped");
    }

    /// Check whether the background task is running
    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    /// Subscribe a handler to an exact name or `*` wildcard pattern
    pub fn subscribe(
        &self,
        pattern: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<SubscriptionId, EventError> {
        self.insert(pattern, HandlerRef::Strong(handler), false)
    }

    /// Subscribe without keeping the handler alive
    ///
    /// The subscription lapses once every other `Arc` to the handler has been
    /// dropped; dead entries are pruned the next time a matching event is
    /// dispatched.
    pub fn subscribe_weak<H>(
        &self,
        pattern: &str,
        handler: &Arc<H>,
    ) -> Result<SubscriptionId, EventError>
    where
        H: EventHandler + 'static,
    {
        let weak: Weak<dyn EventHandler> = Arc::downgrade(handler) as Weak<dyn EventHandler>;
        self.insert(pattern, HandlerRef::Weak(weak), true)
    }

    fn insert(
        &self,
        pattern: &str,
        handler: HandlerRef,
        weak: bool,
    ) -> Result<SubscriptionId, EventError> {
        let pattern = EventPattern::new(pattern)?;
        let id = SubscriptionId::new();
        tracing::debug!(pattern = %pattern.as_str(), weak, "Subscribed to event");
        self.shared.subscriptions.write().push(Subscription {
            id,
            pattern,
            handler,
        });
        Ok(id)
    }

    /// Remove a handler from a pattern
    ///
    /// Handlers are compared by identity. Returns whether a subscription was
    /// removed.
    pub fn unsubscribe<H>(&self, pattern: &str, handler: &Arc<H>) -> bool
    where
        H: EventHandler + ?Sized,
    {
        let target = Arc::as_ptr(handler) as *const ();
        let mut subscriptions = self.shared.subscriptions.write();
        let position = subscriptions
            .iter()
            .position(|s| s.pattern.as_str() == pattern && s.handler.points_to(target));

        match position {
            Some(index) => {
                subscriptions.remove(index);
                tracing::debug!(pattern, "Unsubscribed from event");
                true
            }
            None => false,
        }
    }

    /// Remove a subscription by id
    pub fn unsubscribe_id(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.shared.subscriptions.write();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        before != subscriptions.len()
    }

    /// Queue an event for asynchronous dispatch
    ///
    /// Starts the background task if needed and returns without waiting for
    /// handlers.
    pub async fn emit(&self, event: Event) {
        self.start().await;

        let worker = self.worker.lock();
        let Some(worker) = worker.as_ref() else {
            tracing::warn!(event = %event.name(), "Event bus stopped before event was queued");
            return;
        };

        self.shared.queued.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = worker.sender.send(event) {
            self.shared.queued.fetch_sub(1, Ordering::SeqCst);
            tracing::warn!(event = %e.0.name(), "Event bus worker unavailable, event dropped");
        } else {
            tracing::trace!("Event queued");
        }
    }

    /// Dispatch an event immediately and wait for every matched handler
    pub async fn emit_sync(&self, event: Event) {
        self.shared.dispatch(event).await;
    }

    /// Most recent events, oldest first
    pub fn history(&self, limit: Option<usize>) -> Vec<Event> {
        let history = self.shared.history.lock();
        let skip = match limit {
            Some(limit) => history.len().saturating_sub(limit),
            None => 0,
        };
        history.iter().skip(skip).map(|e| (**e).clone()).collect()
    }

    /// Drop all retained history
    pub fn clear_history(&self) {
        self.shared.history.lock().clear();
        tracing::debug!("Event history cleared");
    }

    /// Current bus statistics
    pub fn stats(&self) -> EventBusStats {
        let mut stats = EventBusStats {
            running: self.is_running(),
            queued: self.shared.queued.load(Ordering::SeqCst),
            history_size: self.shared.history.lock().len(),
            ..Default::default()
        };

        for subscription in self.shared.subscriptions.read().iter() {
            let key = subscription.pattern.as_str().to_string();
            match &subscription.handler {
                HandlerRef::Strong(_) => *stats.handler_counts.entry(key).or_default() += 1,
                HandlerRef::Weak(handler) if handler.strong_count() > 0 => {
                    *stats.weak_handler_counts.entry(key).or_default() += 1
                }
                HandlerRef::Weak(_) => {}
            }
        }

        stats
    }

    /// Number of stored subscriptions, including weak ones not yet pruned
    pub fn subscription_count(&self) -> usize {
        self.shared.subscriptions.read().len()
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.cancel.cancel();
        }
    }
}

async fn run_worker(
    shared: Arc<BusShared>,
    mut receiver: mpsc::UnboundedReceiver<Event>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = receiver.recv() => match next {
                Some(event) => {
                    shared.queued.fetch_sub(1, Ordering::SeqCst);
                    shared.dispatch(event).await;
                }
                None => break,
            },
        }
    }
}
