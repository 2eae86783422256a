use anyhow::Context;
use axum::{routing::get, Router};
use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub const PAGES_FETCHED_TOTAL: &str = "catalog_pages_fetched_total";
pub const RECORDS_FETCHED_TOTAL: &str = "catalog_records_fetched_total";
pub const RECORDS_SKIPPED_TOTAL: &str = "catalog_records_skipped_total";
pub const FETCH_ERRORS_TOTAL: &str = "catalog_fetch_errors_total";
pub const SYNTHETIC_SCORES_TOTAL: &str = "catalog_synthetic_scores_total";

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(PAGES_FETCHED_TOTAL, "Non-empty pages received from the API.");
        describe_counter!(RECORDS_FETCHED_TOTAL, "Records appended to collection snapshots.");
        describe_counter!(
            RECORDS_SKIPPED_TOTAL,
            "Page elements dropped for lacking a usable id or nombre."
        );
        describe_counter!(
            FETCH_ERRORS_TOTAL,
            "Page requests that failed and ended a fetch loop."
        );
        describe_counter!(
            SYNTHETIC_SCORES_TOTAL,
            "Placeholder compatibility scores generated during enrichment."
        );
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Call once, from the binary.
    pub fn install() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
