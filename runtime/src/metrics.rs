//! Prometheus metrics for observability and monitoring.
//!
//! The store records metrics through the `metrics` facade whether or not an
//! exporter is installed. Installing a [`MetricsServer`] makes them available
//! for scraping.
//!
//! # Example
//!
//! ```rust,no_run
//! use tally_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Start metrics server on port 9090
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics server.
///
/// Exposes metrics on an HTTP endpoint for Prometheus scraping.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Socket address to bind to (e.g., `0.0.0.0:9090`)
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Install the global recorder and spawn the HTTP listener.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or a global recorder is
    /// already installed.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let (recorder, exporter) = PrometheusBuilder::new()
            .with_http_listener(self.addr)
            // Configure histogram buckets for latency measurements
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?
            .build()
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        let handle = recorder.handle();
        metrics::set_global_recorder(recorder)
            .map_err(|e| MetricsError::Install(e.to_string()))?;

        let addr = self.addr;
        tokio::spawn(async move {
            if exporter.await.is_err() {
                tracing::error!(%addr, "Metrics listener stopped");
            }
        });

        tracing::info!(
            addr = %self.addr,
            "Metrics server started - available at http://{}/metrics",
            self.addr
        );
        self.handle = Some(handle);
        Ok(())
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if server hasn't been started.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!(
        "store_actions_total",
        "Total number of actions committed by stores"
    );
    describe_counter!(
        "store_actions_ignored_total",
        "Total number of dispatches naming an unknown action"
    );
    describe_counter!(
        "store_actions_rejected_total",
        "Total number of dispatches rejected for invalid arguments or shutdown"
    );
    describe_histogram!(
        "reducer_execution_duration_seconds",
        "Time taken to execute reducers"
    );
    describe_counter!(
        "effects_executed_total",
        "Total number of effects executed"
    );
}

/// Store metrics recorder.
pub struct StoreMetrics;

impl StoreMetrics {
    /// Record a committed action.
    pub fn record_action(action: &'static str, duration: Duration) {
        counter!("store_actions_total", "action" => action).increment(1);
        histogram!("reducer_execution_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a dispatch whose name matched no action.
    pub fn record_ignored() {
        counter!("store_actions_ignored_total").increment(1);
    }

    /// Record a rejected dispatch.
    pub fn record_rejected(reason: &'static str) {
        counter!("store_actions_rejected_total", "reason" => reason).increment(1);
    }
}

/// Effect metrics recorder.
pub struct EffectMetrics;

impl EffectMetrics {
    /// Record an effect execution.
    pub fn record_execution(kind: &'static str) {
        counter!("effects_executed_total", "type" => kind).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_server_creation() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let server = MetricsServer::new(addr);
        assert!(server.handle().is_none());
        assert!(server.render().is_none());
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        StoreMetrics::record_action("increment", Duration::from_micros(3));
        StoreMetrics::record_ignored();
        StoreMetrics::record_rejected("invalid_argument");
        EffectMetrics::record_execution("none");
    }

    #[tokio::test]
    async fn test_metrics_server_render() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let mut server = MetricsServer::new(addr);

        // Only one global recorder per process; this is the only test installing it
        server.start().unwrap();

        StoreMetrics::record_action("increment", Duration::from_micros(5));
        StoreMetrics::record_ignored();

        let rendered = server.render().unwrap();
        assert!(rendered.contains("store_actions_total"));
        assert!(rendered.contains("store_actions_ignored_total"));
    }
}
