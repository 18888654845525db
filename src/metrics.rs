use std::future::ready;

use axum::{routing::get, Router};
use metrics::{describe_counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub const FEEDBACK_INGESTED_TOTAL: &str = "feedback_ingested_total";
pub const SUMMARY_RUNS_TOTAL: &str = "summary_runs_total";
pub const SUMMARY_MODEL_CALLS_TOTAL: &str = "summary_model_calls_total";
pub const SUMMARY_REPAIRS_TOTAL: &str = "summary_repairs_total";

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(FEEDBACK_INGESTED_TOTAL, "Feedback records stored (API + seed).");
        describe_counter!(SUMMARY_RUNS_TOTAL, "Summary pipeline runs by terminal outcome.");
        describe_counter!(
            SUMMARY_MODEL_CALLS_TOTAL,
            "Text-generation calls issued by the summary pipeline."
        );
        describe_counter!(SUMMARY_REPAIRS_TOTAL, "Repair calls after rejected model output.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder. Once per process.
    pub fn init(max_items: usize) -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        ensure_described();

        // Static gauge with the configured batch cap
        gauge!("summary_max_items").set(max_items as f64);

        Ok(Self { handle })
    }

    /// `GET /metrics` in the Prometheus text format. Merged beside the API routes.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route("/metrics", get(move || ready(handle.render())))
    }
}
