use anyhow::Context;
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

fn describe_all() {
    describe_counter!("fare_passes_total", "Detection passes completed.");
    describe_counter!(
        "fare_fetch_errors_total",
        "Fare source requests that failed or returned garbage."
    );
    describe_counter!("fare_notifications_total", "Notifications delivered.");
    describe_counter!(
        "fare_notify_errors_total",
        "Notifications that could not be delivered."
    );
    describe_counter!("fare_ledger_writes_total", "Successful ledger saves.");
    describe_counter!("fare_ledger_write_errors_total", "Failed ledger saves.");
    describe_gauge!("fare_last_pass_ts", "Unix ts of the last completed pass.");
}

/// Install the global Prometheus recorder and describe the `fare_*` series
/// against it. Later calls return the same handle.
pub fn install_prometheus() -> anyhow::Result<PrometheusHandle> {
    HANDLE
        .get_or_try_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .context("prometheus: install recorder")?;
            // Descriptions go to whichever recorder is current, so only now.
            describe_all();
            Ok(handle)
        })
        .cloned()
}
