// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod llm;
pub mod metrics;
pub mod seed;
pub mod store;
pub mod summary;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::llm::{GenerationError, GenerativeClient};
pub use crate::store::{FeedbackRecord, FeedbackStore};
pub use crate::summary::{SummaryError, SummaryOutcome, SummaryPipeline, SummaryResult};

use std::sync::Arc;

use tracing::info;

use crate::config::{AppConfig, StoreBackend};
use crate::store::{DynFeedbackStore, MemoryStore, SqliteStore};

/// Open the configured store backend.
pub fn open_store(cfg: &AppConfig) -> anyhow::Result<DynFeedbackStore> {
    let store: DynFeedbackStore = match cfg.store.backend {
        StoreBackend::Sqlite => Arc::new(SqliteStore::open(&cfg.store.path)?),
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
    };
    info!(backend = store.backend_name(), "feedback store ready");
    Ok(store)
}

/// Wire store, model client and router from a loaded config. No metrics route; the binary
/// mounts that separately because the recorder is process-global.
pub fn app(cfg: &AppConfig) -> anyhow::Result<axum::Router> {
    let store = open_store(cfg)?;
    let client = llm::build_client(&cfg.llm);
    // Safe diagnostics: only provider + enabled + key length
    info!(
        provider = client.provider_name(),
        enabled = cfg.llm.enabled,
        key_len = cfg.llm.api_key.len(),
        "llm client ready"
    );
    Ok(router(AppState::new(store, client, cfg.summary)))
}
