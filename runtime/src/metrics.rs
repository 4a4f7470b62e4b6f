//! Prometheus metrics for the ledger.
//!
//! The ledger crates record counters through the `metrics` facade; this module
//! describes them and installs a Prometheus recorder, optionally with an HTTP
//! scrape endpoint.
//!
//! # Example
//!
//! ```rust,no_run
//! use workshop_ledger_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new(Some("0.0.0.0:9090".parse()?));
//! server.start()?;
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

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

/// Prometheus recorder, with an HTTP listener when an address is given.
pub struct MetricsServer {
    addr: Option<SocketAddr>,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a metrics server; `None` installs the recorder without HTTP.
    #[must_use]
    pub const fn new(addr: Option<SocketAddr>) -> Self {
        Self { addr, handle: None }
    }

    /// Describe all ledger metrics and install the Prometheus recorder.
    ///
    /// With an address this must run inside a Tokio runtime, which serves
    /// the scrape endpoint.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed. A recorder
    /// that is already installed is tolerated.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        let installed = match self.addr {
            Some(addr) => builder.with_http_listener(addr).install().map(|()| None),
            None => builder.install_recorder().map(Some),
        };

        match installed {
            Ok(handle) => {
                self.handle = handle;
                if let Some(addr) = self.addr {
                    tracing::info!(%addr, "Metrics available at http://{addr}/metrics");
                }
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` when an HTTP listener serves them instead, or before
    /// [`start`](Self::start).
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!("ledger.form_numbers.issued", "Form numbers issued");
    describe_counter!("ledger.seats.claimed", "Seats taken by registrations");
    describe_counter!("ledger.seats.released", "Seats freed by deletions or aborted submissions");
    describe_counter!(
        "ledger.capacity.rejected",
        "Submissions refused because the workshop was full or not active"
    );
    describe_counter!("ledger.registrations.submitted", "Registrations created");
    describe_counter!("ledger.registrations.deleted", "Registrations deleted");
    describe_counter!(
        "ledger.reconcile.drift_corrected",
        "Workshops whose seat counter disagreed with their registrations"
    );
    describe_counter!(
        "ledger.compensation.failed",
        "Seats that could not be released after a failed step; reconcile needed"
    );
    describe_counter!("ledger.storage.retries", "Transient storage failures retried");
    describe_counter!(
        "ledger.storage.retry_successes",
        "Operations that succeeded after at least one retry"
    );
    describe_counter!(
        "ledger.storage.retries_exhausted",
        "Operations that failed after the last retry"
    );
    describe_histogram!(
        "ledger.reconcile.duration_seconds",
        "Time taken to reconcile all workshops"
    );
}

/// Reconciliation metrics recorder.
pub struct ReconcileMetrics;

impl ReconcileMetrics {
    /// Record a full reconciliation pass.
    pub fn record_pass(duration: Duration) {
        metrics::histogram!("ledger.reconcile.duration_seconds").record(duration.as_secs_f64());
    }
}
