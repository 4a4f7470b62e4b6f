//! Operator tools for the workshop ledger.
//!
//! Two binaries share this library:
//!
//! - `ledger-reconcile [WORKSHOP_ID]` recounts registrations and repairs
//!   drifted seat counters for one workshop or all of them
//! - `ledger-status` prints every workshop's status, seats and prefix
//!
//! Both read [`Config`] from the environment, open the configured store,
//! run one [`LedgerTask`] and close the store again.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;

use anyhow::Context;
use std::fmt::Write;
use std::future::Future;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use workshop_ledger_core::store::LedgerStore;
use workshop_ledger_core::types::{DEFAULT_FORM_PREFIX, ReconcileReport, Workshop, WorkshopId};
use workshop_ledger_local::JsonFileLedgerStore;
use workshop_ledger_postgres::PostgresLedgerStore;
use workshop_ledger_runtime::LedgerRuntime;
use workshop_ledger_runtime::metrics::MetricsServer;

pub use config::{Backend, Config};

/// Install the `tracing` subscriber (`RUST_LOG` overrides the default filter).
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,workshop_ledger=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// One unit of operator work, runnable against any backend.
pub trait LedgerTask {
    /// Run against `runtime` and return the lines to print.
    fn run<S: LedgerStore>(
        self,
        runtime: &LedgerRuntime<S>,
    ) -> impl Future<Output = anyhow::Result<Vec<String>>>;
}

/// Open the configured store, run `task`, and close the store.
///
/// Starts the Prometheus exporter first when `METRICS_ADDR` is set.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or the task fails.
pub async fn execute<T: LedgerTask>(config: &Config, task: T) -> anyhow::Result<Vec<String>> {
    if let Some(addr) = config.metrics_addr {
        MetricsServer::new(Some(addr))
            .start()
            .context("failed to start metrics exporter")?;
    }

    match &config.backend {
        Backend::Postgres(postgres) => {
            let store = Arc::new(
                PostgresLedgerStore::connect(postgres)
                    .await
                    .context("failed to connect to PostgreSQL")?,
            );
            let runtime = LedgerRuntime::new(Arc::clone(&store), config.retry.clone());
            let output = task.run(&runtime).await;
            store.close().await;
            output
        }
        Backend::Json { data_dir } => {
            let store = Arc::new(
                JsonFileLedgerStore::open(data_dir)
                    .await
                    .with_context(|| format!("failed to open {}", data_dir.display()))?,
            );
            let runtime = LedgerRuntime::new(Arc::clone(&store), config.retry.clone());
            let output = task.run(&runtime).await;
            store.close().await;
            output
        }
    }
}

/// Recount one workshop, or every workshop when `workshop_id` is `None`.
#[derive(Debug, Clone, Copy)]
pub struct Reconcile {
    /// Workshop to reconcile; all of them when `None`.
    pub workshop_id: Option<WorkshopId>,
}

impl LedgerTask for Reconcile {
    async fn run<S: LedgerStore>(self, runtime: &LedgerRuntime<S>) -> anyhow::Result<Vec<String>> {
        let reports = match self.workshop_id {
            Some(id) => vec![
                runtime
                    .reconcile(id)
                    .await
                    .with_context(|| format!("failed to reconcile workshop {id}"))?,
            ],
            None => runtime
                .reconcile_all()
                .await
                .context("reconciliation pass failed")?,
        };
        Ok(reports.iter().map(format_report).collect())
    }
}

/// List every workshop.
#[derive(Debug, Clone, Copy)]
pub struct Status;

impl LedgerTask for Status {
    async fn run<S: LedgerStore>(self, runtime: &LedgerRuntime<S>) -> anyhow::Result<Vec<String>> {
        let workshops = runtime
            .workshops()
            .await
            .context("failed to list workshops")?;
        if workshops.is_empty() {
            return Ok(vec!["no workshops".to_string()]);
        }
        Ok(workshops.iter().map(format_status).collect())
    }
}

/// `title: before -> after`, or `title: already correct at N`.
#[must_use]
pub fn format_report(report: &ReconcileReport) -> String {
    let mut line = if report.drifted() {
        format!("{}: {} -> {}", report.title, report.before, report.after)
    } else {
        format!("{}: already correct at {}", report.title, report.after)
    };
    if report.status_before != report.status_after {
        let _ = write!(
            line,
            " (status {} -> {})",
            report.status_before, report.status_after
        );
    }
    line
}

/// One status line: id, title, status, seats and prefix.
#[must_use]
pub fn format_status(workshop: &Workshop) -> String {
    let prefix = workshop
        .form_prefix()
        .map_or_else(|| format!("none (uses {DEFAULT_FORM_PREFIX})"), ToString::to_string);
    format!(
        "{}  {}  [{}]  {}/{} seats  prefix {}",
        workshop.id,
        workshop.title,
        workshop.status,
        workshop.current_registrations,
        workshop.max_seats,
        prefix
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use workshop_ledger_core::environment::Clock;
    use workshop_ledger_core::store::WorkshopStore;
    use workshop_ledger_core::types::WorkshopStatus;
    use workshop_ledger_runtime::retry::RetryPolicy;
    use workshop_ledger_testing::{InMemoryLedgerStore, WorkshopBuilder, test_clock};

    fn runtime(store: &Arc<InMemoryLedgerStore>) -> LedgerRuntime<InMemoryLedgerStore> {
        LedgerRuntime::with_clock(Arc::clone(store), Arc::new(test_clock()), RetryPolicy::no_retry())
    }

    #[test]
    fn report_lines() {
        let mut workshop = WorkshopBuilder::new()
            .title("Wound Care")
            .max_seats(2)
            .current_registrations(2)
            .status(WorkshopStatus::Full)
            .build();

        let report = workshop.reconcile(1, test_clock().now());
        assert_eq!(
            format_report(&report),
            "Wound Care: 2 -> 1 (status full -> active)"
        );

        let report = workshop.reconcile(1, test_clock().now());
        assert_eq!(format_report(&report), "Wound Care: already correct at 1");
    }

    #[test]
    fn status_line_shows_prefix_fallback() {
        let workshop = WorkshopBuilder::new()
            .title("Triage")
            .without_prefix()
            .max_seats(30)
            .current_registrations(12)
            .build();
        assert_eq!(
            format_status(&workshop),
            format!(
                "{}  Triage  [active]  12/30 seats  prefix none (uses REG)",
                workshop.id
            )
        );
    }

    #[tokio::test]
    async fn reconcile_task_repairs_one_workshop() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let workshop = WorkshopBuilder::new().title("ICU").current_registrations(4).build();
        store.insert_workshop(&workshop).await.unwrap();

        let lines = Reconcile {
            workshop_id: Some(workshop.id),
        }
        .run(&runtime(&store))
        .await
        .unwrap();
        assert_eq!(lines, ["ICU: 4 -> 0"]);

        let lines = Reconcile { workshop_id: None }
            .run(&runtime(&store))
            .await
            .unwrap();
        assert_eq!(lines, ["ICU: already correct at 0"]);
    }

    #[tokio::test]
    async fn reconcile_task_reports_unknown_workshop() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let err = Reconcile {
            workshop_id: Some(WorkshopId::new()),
        }
        .run(&runtime(&store))
        .await
        .unwrap_err();
        assert!(err.to_string().contains("failed to reconcile workshop"));
    }

    #[tokio::test]
    async fn status_task_lists_workshops() {
        let store = Arc::new(InMemoryLedgerStore::new());
        assert_eq!(
            Status.run(&runtime(&store)).await.unwrap(),
            ["no workshops"]
        );

        store
            .insert_workshop(&WorkshopBuilder::new().title("ICU").build())
            .await
            .unwrap();
        let lines = Status.run(&runtime(&store)).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("ICU  [active]  0/10 seats  prefix CPD"));
    }
}
