use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Router,
};
use chrono::Utc;
use metrics::counter;
use serde_json::Value;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::config::SummaryConfig;
use crate::llm::DynGenerativeClient;
use crate::metrics::FEEDBACK_INGESTED_TOTAL;
use crate::seed::seed_samples;
use crate::store::DynFeedbackStore;
use crate::summary::{SummaryError, SummaryOutcome, SummaryPipeline};

pub const USAGE: &str = "Feedback Pulse is running.

Routes:
GET /seed       insert a handful of sample feedback items
POST /feedback  store one item: {\"source\": \"...\", \"content\": \"...\"}
GET /summary    AI digest of the most recent feedback

First run /seed, then check /summary.
";

pub const NO_FEEDBACK: &str = "No feedback yet.";
pub const INVALID_JSON: &str = "Invalid JSON body";
pub const MISSING_FIELDS: &str = "Missing 'source' or 'content'";

#[derive(Clone)]
pub struct AppState {
    pub store: DynFeedbackStore,
    pub pipeline: Arc<SummaryPipeline>,
}

impl AppState {
    pub fn new(store: DynFeedbackStore, client: DynGenerativeClient, cfg: SummaryConfig) -> Self {
        let pipeline = SummaryPipeline::with_config(store.clone(), client, cfg);
        Self {
            store,
            pipeline: Arc::new(pipeline),
        }
    }
}

/// Build the HTTP router. Unknown paths and wrong methods on known paths both yield 404.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", any(usage))
        .route("/seed", get(seed).fallback(not_found))
        .route("/feedback", post(submit_feedback).fallback(not_found))
        .route("/summary", get(summary).fallback(not_found))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

pub enum ApiError {
    Validation(&'static str),
    Store(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            ApiError::Store(e) => {
                error!(error = %format!("{e:#}"), "store operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Storage error: {e:#}"),
                )
                    .into_response()
            }
        }
    }
}

async fn usage() -> &'static str {
    USAGE
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not found")
}

async fn seed(State(state): State<AppState>) -> Result<&'static str, ApiError> {
    let n = seed_samples(state.store.as_ref(), Utc::now())
        .await
        .map_err(ApiError::Store)?;
    info!(inserted = n, backend = state.store.backend_name(), "seed data inserted");
    Ok("Seed data inserted.")
}

/// Field as text, treating missing, null, "", 0 and false as absent.
/// Other non-string values are kept in their JSON text form.
fn field_text(body: &Value, key: &str) -> Option<String> {
    match body.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        v @ (Value::Array(_) | Value::Object(_)) => Some(v.to_string()),
        _ => None,
    }
}

async fn submit_feedback(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, &'static str), ApiError> {
    let parsed: Value =
        serde_json::from_slice(&body).map_err(|_| ApiError::Validation(INVALID_JSON))?;

    let (Some(source), Some(content)) = (
        field_text(&parsed, "source"),
        field_text(&parsed, "content"),
    ) else {
        return Err(ApiError::Validation(MISSING_FIELDS));
    };

    state
        .store
        .insert(&source, &content, Utc::now())
        .await
        .map_err(ApiError::Store)?;
    counter!(FEEDBACK_INGESTED_TOTAL).increment(1);
    info!(source = %source, content_len = content.len(), "feedback stored");

    Ok((StatusCode::CREATED, "Feedback stored."))
}

async fn summary(State(state): State<AppState>) -> Response {
    match state.pipeline.run().await {
        Ok(SummaryOutcome::Empty) => (StatusCode::OK, NO_FEEDBACK).into_response(),
        Ok(SummaryOutcome::Done { result, repaired }) => {
            let body = match serde_json::to_string_pretty(&result) {
                Ok(b) => b,
                Err(e) => {
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        format!("Serialization error: {e}"),
                    )
                        .into_response()
                }
            };
            let mut resp = (
                [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
                body,
            )
                .into_response();
            resp.headers_mut().insert(
                "x-summary-repaired",
                HeaderValue::from_static(if repaired { "1" } else { "0" }),
            );
            resp
        }
        Err(SummaryError::Generation(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Generation error: {e}"),
        )
            .into_response(),
        Err(SummaryError::Unrepairable {
            raw_text,
            parse_error,
            ..
        }) => (
            StatusCode::OK,
            format!(
                "AI output couldn't be parsed as JSON (even after repair).\n\n--- RAW ---\n{raw_text}\n\n--- ERROR ---\n{parse_error}"
            ),
        )
            .into_response(),
        Err(SummaryError::Store(e)) => ApiError::Store(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_text_treats_falsy_values_as_missing() {
        let body = json!({ "a": "", "b": null, "c": 0, "d": false, "e": "ok", "f": 7, "g": true });
        assert_eq!(field_text(&body, "a"), None);
        assert_eq!(field_text(&body, "b"), None);
        assert_eq!(field_text(&body, "c"), None);
        assert_eq!(field_text(&body, "d"), None);
        assert_eq!(field_text(&body, "missing"), None);
        assert_eq!(field_text(&body, "e").as_deref(), Some("ok"));
        assert_eq!(field_text(&body, "f").as_deref(), Some("7"));
        assert_eq!(field_text(&body, "g").as_deref(), Some("true"));
    }

    #[test]
    fn field_text_on_non_object_body_is_missing() {
        assert_eq!(field_text(&json!([1, 2]), "source"), None);
        assert_eq!(field_text(&json!("text"), "source"), None);
    }
}
