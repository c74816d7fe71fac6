//! Per-execution timing carried in the context

use crate::executor::ExecutionContext;
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;

/// Records start offsets in context metadata instead of shared state
///
/// Offsets are nanoseconds since `origin`, so nothing is left behind when
/// an execution is cancelled between the two hooks.
pub(crate) struct Stopwatch {
    origin: Instant,
    key: &'static str,
}

impl Stopwatch {
    pub(crate) fn new(key: &'static str) -> Self {
        Self {
            origin: Instant::now(),
            key,
        }
    }

    pub(crate) fn start(&self, context: &mut ExecutionContext) {
        let offset = self.origin.elapsed().as_nanos() as u64;
        context
            .metadata
            .insert(self.key.to_string(), Value::from(offset));
    }

    /// Time since [`start`](Self::start) ran on this context
    pub(crate) fn elapsed(&self, context: &ExecutionContext) -> Option<Duration> {
        let started = context.metadata.get(self.key)?.as_u64()?;
        Some(
            self.origin
                .elapsed()
                .saturating_sub(Duration::from_nanos(started)),
        )
    }
}
