//! Feedback Pulse — Binary Entrypoint
//! Boots the Axum HTTP server: config, store, model client, metrics and routes.

use anyhow::Context;
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use feedback_pulse::config::AppConfig;
use feedback_pulse::metrics::Metrics;

/// Compact logs by default, JSON lines with LOG_FORMAT=json.
/// Uses try_init so an already-installed subscriber (e.g. the host runtime's) wins.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("feedback_pulse=info,summary=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = AppConfig::load().context("loading feedback-pulse config")?;
    let metrics = Metrics::init(cfg.summary.max_items).context("installing metrics recorder")?;

    let router = feedback_pulse::app(&cfg)?.merge(metrics.router());

    Ok(router.into())
}
