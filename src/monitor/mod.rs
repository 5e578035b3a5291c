// src/monitor/mod.rs
//! One detection pass: load ledger → fetch both shapes → detect → notify →
//! save ledger if it changed. Shared by `once` and `watch`.

pub mod scheduler;

use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use metrics::{counter, gauge};
use serde::Serialize;

use crate::change_detector::{detect, Observation, PriceEvent};
use crate::config::SessionConfig;
use crate::fare::{FareSnapshot, FareSource, Shape};
use crate::ledger::{Ledger, LedgerStore};
use crate::notify::{compose, DynNotifier};
use crate::Result;

/// Immutable summary of a finished pass. Published to subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub observations: Vec<Observation>,
    pub events: Vec<PriceEvent>,
    pub notified: usize,
    pub notify_failures: usize,
    pub ledger_changed: bool,
    pub ledger_saved: bool,
}

pub struct Monitor {
    config: Arc<SessionConfig>,
    source: Arc<dyn FareSource>,
    notifier: DynNotifier,
    store: LedgerStore,
}

impl Monitor {
    pub fn new(
        config: Arc<SessionConfig>,
        source: Arc<dyn FareSource>,
        notifier: DynNotifier,
        store: LedgerStore,
    ) -> Self {
        Self {
            config,
            source,
            notifier,
            store,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Missing ledger → empty; corrupt ledger → error.
    pub async fn load_ledger(&self) -> Result<Ledger> {
        self.store.load_or_empty().await
    }

    /// Query both shapes. Either failing fails the pair.
    pub async fn fetch(&self) -> Result<(FareSnapshot, FareSnapshot)> {
        let route = &self.config.route;
        tracing::debug!(source = self.source.name(), "fetching fares");
        tokio::try_join!(
            self.source.fetch(route, Shape::Direct),
            self.source.fetch(route, Shape::NonDirect),
        )
    }

    /// Detect, notify, persist. Nothing in here aborts the pass: delivery and
    /// write failures are logged and reflected in the report.
    pub async fn complete(
        &self,
        ledger: Ledger,
        direct: &FareSnapshot,
        non_direct: &FareSnapshot,
        started_at: DateTime<Utc>,
    ) -> PassReport {
        let cfg = &self.config;
        let detection = detect(&cfg.dates, direct, non_direct, &ledger, cfg.price_step);

        let now = Local::now();
        let mut notified = 0usize;
        let mut notify_failures = 0usize;
        for ev in &detection.events {
            let msg = compose(&cfg.route, ev, now);
            match self.notifier.send(&msg).await {
                Ok(()) => {
                    notified += 1;
                    counter!("fare_notifications_total").increment(1);
                }
                Err(e) => {
                    notify_failures += 1;
                    counter!("fare_notify_errors_total").increment(1);
                    tracing::error!(
                        notifier = self.notifier.name(),
                        date = %ev.date,
                        shape = %ev.shape,
                        "{e}"
                    );
                }
            }
        }

        let ledger_saved = if detection.changed {
            match self.store.save(&detection.ledger).await {
                Ok(()) => {
                    tracing::info!(path = %self.store.path().display(), "ledger updated");
                    true
                }
                Err(e) => {
                    tracing::error!("{e}");
                    false
                }
            }
        } else {
            tracing::info!("no price moved past the threshold, ledger unchanged");
            false
        };

        let finished_at = Utc::now();
        counter!("fare_passes_total").increment(1);
        gauge!("fare_last_pass_ts").set(finished_at.timestamp() as f64);

        let report = PassReport {
            started_at,
            finished_at,
            observations: detection.observations,
            events: detection.events,
            notified,
            notify_failures,
            ledger_changed: detection.changed,
            ledger_saved,
        };
        log_report(&report);
        report
    }

    /// Single pass, as run by an external scheduler.
    pub async fn run_once(&self) -> Result<PassReport> {
        let started_at = Utc::now();
        let ledger = self.load_ledger().await?;
        let (direct, non_direct) = self.fetch().await?;
        Ok(self.complete(ledger, &direct, &non_direct, started_at).await)
    }
}

/// One line per (date, shape): price or "no data", whether a push fired, why.
pub fn log_report(report: &PassReport) {
    for o in &report.observations {
        let observed = o
            .observed
            .map(|p| p.to_string())
            .unwrap_or_else(|| "no data".to_string());
        tracing::info!(
            date = %o.date.pretty(),
            shape = %o.shape,
            observed = %observed,
            notified = o.outcome.notifies(),
            reason = o.outcome.reason(),
            "fare check"
        );
    }
    tracing::info!(
        events = report.events.len(),
        notified = report.notified,
        failed = report.notify_failures,
        "pass complete"
    );
}
