// src/summary/pipeline.rs
//! Summary pipeline: fetch → prompt → generate → parse, with at most one repair call.
//!
//! Stages: FETCHING → PROMPTING → GENERATING → PARSING → (DONE | REPAIRING)
//! → (DONE | FAILED).
//! A run makes at most two model calls and they are strictly sequential.

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::coerce::{extract_json, ParseFailure};
use super::prompt::{build_repair_prompt, build_summary_prompt};
use super::SummaryResult;
use crate::config::{SummaryConfig, MAX_SUMMARY_ITEMS, MAX_WINDOW_HOURS};
use crate::llm::{DynGenerativeClient, GenerationError};
use crate::metrics as m;
use crate::store::DynFeedbackStore;

/// Non-error terminal states.
#[derive(Debug, Clone, PartialEq)]
pub enum SummaryOutcome {
    /// Nothing stored yet; no model call was made.
    Empty,
    Done {
        result: SummaryResult,
        /// True when the repair call produced the result.
        repaired: bool,
    },
}

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("storage error: {0:#}")]
    Store(anyhow::Error),

    /// The first model call failed outright. Not retried.
    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),

    /// Neither the first output nor the repaired one validated.
    #[error("unrepairable model output: {parse_error}")]
    Unrepairable {
        /// First model output, verbatim.
        raw_text: String,
        /// Why the first output was rejected.
        parse_error: ParseFailure,
        /// Why the repair attempt did not help.
        repair_error: String,
    },
}

impl SummaryError {
    fn outcome_label(&self) -> &'static str {
        match self {
            SummaryError::Store(_) => "store_error",
            SummaryError::Generation(_) => "generation_error",
            SummaryError::Unrepairable { .. } => "unrepairable",
        }
    }
}

pub struct SummaryPipeline {
    store: DynFeedbackStore,
    client: DynGenerativeClient,
    max_items: usize,
    window: Duration,
}

impl SummaryPipeline {
    pub fn new(store: DynFeedbackStore, client: DynGenerativeClient) -> Self {
        Self::with_config(store, client, SummaryConfig::default())
    }

    pub fn with_config(
        store: DynFeedbackStore,
        client: DynGenerativeClient,
        cfg: SummaryConfig,
    ) -> Self {
        Self {
            store,
            client,
            max_items: cfg.max_items.clamp(1, MAX_SUMMARY_ITEMS),
            window: Duration::hours(cfg.window_hours.clamp(1, MAX_WINDOW_HOURS)),
        }
    }

    pub async fn run(&self) -> Result<SummaryOutcome, SummaryError> {
        self.run_at(Utc::now()).await
    }

    /// Same as `run`, with the clock pinned to `now`.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<SummaryOutcome, SummaryError> {
        m::ensure_described();
        let res = self.execute(now).await;
        let label = match &res {
            Ok(SummaryOutcome::Empty) => "empty",
            Ok(SummaryOutcome::Done { repaired: false, .. }) => "done",
            Ok(SummaryOutcome::Done { repaired: true, .. }) => "repaired",
            Err(e) => e.outcome_label(),
        };
        counter!(m::SUMMARY_RUNS_TOTAL, "outcome" => label).increment(1);
        info!(
            target: "summary",
            outcome = label,
            provider = self.client.provider_name(),
            "summary run finished"
        );
        res
    }

    async fn execute(&self, now: DateTime<Utc>) -> Result<SummaryOutcome, SummaryError> {
        // FETCHING
        let records = self
            .store
            .query_recent(self.max_items)
            .await
            .map_err(SummaryError::Store)?;
        if records.is_empty() {
            debug!(target: "summary", "no feedback stored; skipping model call");
            return Ok(SummaryOutcome::Empty);
        }

        // PROMPTING
        let prompt = build_summary_prompt(&records, now, self.window);
        debug!(
            target: "summary",
            items = records.len(),
            prompt_len = prompt.user.len(),
            "prompt built"
        );

        // GENERATING
        let raw = self.call_model(&prompt.system, &prompt.user).await?;

        // PARSING
        let first_failure = match extract_json(&raw) {
            Ok(result) => {
                return Ok(SummaryOutcome::Done {
                    result,
                    repaired: false,
                })
            }
            Err(e) => e,
        };
        warn!(
            target: "summary",
            kind = ?first_failure.kind,
            reason = %first_failure.reason,
            raw_len = raw.len(),
            "model output rejected; attempting repair"
        );

        // REPAIRING
        counter!(m::SUMMARY_REPAIRS_TOTAL).increment(1);
        let repair = build_repair_prompt(&raw);
        let repair_error = match self.call_model(&repair.system, &repair.user).await {
            Ok(repaired_raw) => match extract_json(&repaired_raw) {
                Ok(result) => {
                    return Ok(SummaryOutcome::Done {
                        result,
                        repaired: true,
                    })
                }
                Err(e) => e.to_string(),
            },
            Err(e) => format!("repair call failed: {e}"),
        };

        warn!(
            target: "summary",
            repair_error = %repair_error,
            "repair did not produce valid output"
        );
        Err(SummaryError::Unrepairable {
            raw_text: raw,
            parse_error: first_failure,
            repair_error,
        })
    }

    async fn call_model(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        counter!(m::SUMMARY_MODEL_CALLS_TOTAL).increment(1);
        self.client.generate(system, user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedClient;
    use crate::store::{FeedbackStore, MemoryStore};
    use chrono::TimeZone;
    use std::sync::Arc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 9, 30, 0).unwrap()
    }

    #[tokio::test]
    async fn empty_store_short_circuits_without_model_call() {
        let client = Arc::new(ScriptedClient::new().reply("{}"));
        let pipeline = SummaryPipeline::new(Arc::new(MemoryStore::new()), client.clone());
        let out = pipeline.run_at(now()).await.unwrap();
        assert_eq!(out, SummaryOutcome::Empty);
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn fetch_is_capped_by_config() {
        let store = Arc::new(MemoryStore::new());
        for i in 0..20 {
            store.insert("github", &format!("item {i}"), now()).await.unwrap();
        }
        let client = Arc::new(ScriptedClient::new().fail("boom"));
        let cfg = SummaryConfig {
            max_items: 4,
            window_hours: 24,
        };
        let pipeline = SummaryPipeline::with_config(store, client.clone(), cfg);
        let _ = pipeline.run_at(now()).await;
        let calls = client.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].user.contains("TOTAL ITEMS: 4\n"));
    }

    #[tokio::test]
    async fn repair_generation_failure_is_unrepairable() {
        let store = Arc::new(MemoryStore::new());
        store.insert("github", "hello", now()).await.unwrap();
        let client = Arc::new(ScriptedClient::new().reply("not json").fail("upstream 503"));
        let pipeline = SummaryPipeline::new(store, client.clone());
        match pipeline.run_at(now()).await {
            Err(SummaryError::Unrepairable {
                raw_text,
                repair_error,
                ..
            }) => {
                assert_eq!(raw_text, "not json");
                assert!(repair_error.contains("upstream 503"));
            }
            other => panic!("expected Unrepairable, got {other:?}"),
        }
        assert_eq!(client.call_count(), 2);
    }
}
