//! Per-tool execution metrics

use super::stopwatch::Stopwatch;
use super::{Middleware, MiddlewareError, Outcome};
use crate::events::{Event, EventBus};
use crate::executor::{ExecutionContext, ExecutionError};
use crate::tools::Tool;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Counters and timings for one tool
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToolMetrics {
    /// Completed executions (success or failure)
    pub executions: u64,
    /// Successful executions
    pub successes: u64,
    /// Failed executions, rejections included
    pub failures: u64,
    /// Executions refused by middleware
    pub rejections: u64,
    /// Sum of measured durations
    #[serde(with = "humantime_serde")]
    pub total_duration: Duration,
    /// Duration of the most recent execution
    #[serde(with = "humantime_serde")]
    pub last_duration: Option<Duration>,
}

impl ToolMetrics {
    /// Mean duration over all executions
    pub fn average_duration(&self) -> Duration {
        if self.executions == 0 {
            Duration::ZERO
        } else {
            self.total_duration.div_f64(self.executions as f64)
        }
    }

    /// Fraction of executions that succeeded
    pub fn success_rate(&self) -> f64 {
        if self.executions == 0 {
            0.0
        } else {
            self.successes as f64 / self.executions as f64
        }
    }
}

/// Records counts and durations keyed by tool name
pub struct MetricsMiddleware {
    metrics: RwLock<HashMap<String, ToolMetrics>>,
    stopwatch: Stopwatch,
    event_bus: Option<Arc<EventBus>>,
}

impl Default for MetricsMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsMiddleware {
    /// Create a collector
    pub fn new() -> Self {
        Self {
            metrics: RwLock::new(HashMap::new()),
            stopwatch: Stopwatch::new("metrics_started_ns"),
            event_bus: None,
        }
    }

    /// Publish a `metrics.recorded` event after every execution
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Metrics for one tool
    pub fn get(&self, tool: &str) -> Option<ToolMetrics> {
        self.metrics.read().get(tool).cloned()
    }

    /// Metrics for every tool seen so far
    pub fn snapshot(&self) -> HashMap<String, ToolMetrics> {
        self.metrics.read().clone()
    }

    /// Forget all recorded metrics
    pub fn reset(&self) {
        self.metrics.write().clear();
    }
}

#[async_trait]
impl Middleware for MetricsMiddleware {
    fn name(&self) -> &str {
        "metrics"
    }

    async fn pre_process(
        &self,
        _tool: &dyn Tool,
        mut context: ExecutionContext,
    ) -> Result<ExecutionContext, MiddlewareError> {
        self.stopwatch.start(&mut context);
        Ok(context)
    }

    async fn post_process(
        &self,
        tool: &dyn Tool,
        context: &ExecutionContext,
        outcome: &Outcome,
    ) -> Result<(), MiddlewareError> {
        let duration = self.stopwatch.elapsed(context).unwrap_or_default();

        let success = outcome.is_ok();
        let snapshot = {
            let mut metrics = self.metrics.write();
            let entry = metrics.entry(tool.name().to_string()).or_default();
            entry.executions += 1;
            entry.total_duration += duration;
            entry.last_duration = Some(duration);
            match outcome {
                Ok(_) => entry.successes += 1,
                Err(ExecutionError::Rejected { .. }) => {
                    entry.failures += 1;
                    entry.rejections += 1;
                }
                Err(_) => entry.failures += 1,
            }
            entry.clone()
        };

        tracing::debug!(
            tool = %tool.name(),
            duration_ms = duration.as_secs_f64() * 1000.0,
            success,
            executions = snapshot.executions,
            "Recorded execution metrics"
        );

        if let Some(bus) = &self.event_bus {
            let event = Event::new("metrics.recorded")
                .map_err(|e| MiddlewareError::failed(self.name(), e.to_string()))?
                .with_source("metrics")
                .with_correlation_id(context.request_id())
                .with_data("tool_name", json!(tool.name()))
                .with_data("duration", json!(duration.as_secs_f64()))
                .with_data("success", json!(success))
                .with_data("executions", json!(snapshot.executions))
                .with_data("failures", json!(snapshot.failures));
            bus.emit(event).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::handler_fn;
    use crate::middleware::test_support::EchoTool;
    use crate::tools::ToolError;
    use parking_lot::Mutex;

    async fn record(metrics: &MetricsMiddleware, tool: &EchoTool, outcome: Outcome) {
        let context = metrics
            .pre_process(tool, ExecutionContext::new())
            .await
            .unwrap();
        metrics.post_process(tool, &context, &outcome).await.unwrap();
    }

    #[tokio::test]
    async fn test_counts_per_tool() {
        let metrics = MetricsMiddleware::new();
        let search = EchoTool::new("search");
        let browse = EchoTool::new("browse");

        record(&metrics, &search, Ok(json!(1))).await;
        record(&metrics, &search, Err(ToolError::failed("timeout").into())).await;
        record(&metrics, &search, Err(ExecutionError::rejected("circuit_breaker", "open"))).await;
        record(&metrics, &browse, Ok(json!(2))).await;

        let search_metrics = metrics.get("search").unwrap();
        assert_eq!(search_metrics.executions, 3);
        assert_eq!(search_metrics.successes, 1);
        assert_eq!(search_metrics.failures, 2);
        assert_eq!(search_metrics.rejections, 1);
        assert!(search_metrics.last_duration.is_some());

        assert_eq!(metrics.snapshot().len(), 2);
        metrics.reset();
        assert!(metrics.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_measures_duration() {
        let metrics = MetricsMiddleware::new();
        let tool = EchoTool::new("slow");

        let context = metrics
            .pre_process(&tool, ExecutionContext::new())
            .await
            .unwrap();
        tokio::time::advance(Duration::from_millis(250)).await;
        metrics
            .post_process(&tool, &context, &Ok(json!(null)))
            .await
            .unwrap();

        let recorded = metrics.get("slow").unwrap();
        assert_eq!(recorded.total_duration, Duration::from_millis(250));
        assert_eq!(recorded.average_duration(), Duration::from_millis(250));
        assert_eq!(recorded.success_rate(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_calls_with_one_request_id() {
        let metrics = MetricsMiddleware::new();
        let tool = EchoTool::new("search");

        // abandoned call: pre-processing ran but the execution was cancelled
        metrics
            .pre_process(&tool, ExecutionContext::with_request_id("shared"))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_millis(500)).await;

        let first = metrics
            .pre_process(&tool, ExecutionContext::with_request_id("shared"))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_millis(100)).await;
        let second = metrics
            .pre_process(&tool, ExecutionContext::with_request_id("shared"))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_millis(100)).await;

        metrics.post_process(&tool, &first, &Ok(json!(1))).await.unwrap();
        let recorded = metrics.get("search").unwrap();
        assert_eq!(recorded.last_duration, Some(Duration::from_millis(200)));

        metrics.post_process(&tool, &second, &Ok(json!(2))).await.unwrap();
        let recorded = metrics.get("search").unwrap();
        assert_eq!(recorded.last_duration, Some(Duration::from_millis(100)));
        assert_eq!(recorded.total_duration, Duration::from_millis(300));
        assert_eq!(recorded.executions, 2);
    }

    #[test]
    fn test_average_over_huge_counts() {
        let metrics = ToolMetrics {
            executions: 1 << 32,
            successes: 1 << 32,
            total_duration: Duration::from_secs(1 << 32),
            ..ToolMetrics::default()
        };
        assert_eq!(metrics.average_duration(), Duration::from_secs(1));
        assert_eq!(ToolMetrics::default().average_duration(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_publishes_metrics_events() {
        let bus = Arc::new(EventBus::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe(
            "metrics.recorded",
            handler_fn(move |event| {
                let sink = sink.clone();
                async move {
                    sink.lock().push(event);
                    Ok(())
                }
            }),
        )
        .unwrap();

        let metrics = MetricsMiddleware::new().with_event_bus(bus.clone());
        record(&metrics, &EchoTool::new("search"), Ok(json!(1))).await;

        for _ in 0..100 {
            if !seen.lock().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let events = seen.lock().clone();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].get("tool_name"), Some(&json!("search")));
        assert_eq!(events[0].get("success"), Some(&json!(true)));
        bus.stop().await;
    }
}
