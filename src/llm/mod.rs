//! Text-generation client: provider abstraction + concrete providers.
//!
//! The summary pipeline only sees `GenerativeClient::generate(system, user)`; everything about
//! HTTP, keys and provider response envelopes stays in this module.

pub mod openai;
pub mod scripted;
pub mod workers_ai;

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::config::llm::LlmConfig;

pub use openai::OpenAiClient;
pub use scripted::ScriptedClient;
pub use workers_ai::WorkersAiClient;

/// Errors raised by the model call itself. Never retried by the pipeline.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("text generation is disabled")]
    Disabled,

    #[error("missing API credentials for {0}")]
    MissingCredentials(&'static str),

    #[error("provider returned {status}: {message}")]
    Http { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Provider(String),
}

#[async_trait::async_trait]
pub trait GenerativeClient: Send + Sync {
    /// Run one system+user exchange and return the model's raw text.
    async fn generate(&self, system: &str, user: &str) -> Result<String, GenerationError>;

    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynGenerativeClient = Arc<dyn GenerativeClient>;

/// Factory: build a client according to config and environment.
///
/// * `FEEDBACK_LLM_MODE=mock` forces the deterministic mock client.
/// * `enabled == false` yields a client that always fails with `Disabled`.
/// * Otherwise the configured provider.
pub fn build_client(cfg: &LlmConfig) -> DynGenerativeClient {
    let forced_mock = std::env::var("FEEDBACK_LLM_MODE")
        .map(|v| v.eq_ignore_ascii_case("mock"))
        .unwrap_or(false);
    if forced_mock {
        return Arc::new(MockClient);
    }
    if !cfg.enabled {
        return Arc::new(DisabledClient);
    }

    match cfg.provider.as_str() {
        "workers-ai" => Arc::new(WorkersAiClient::new(cfg)),
        "openai" => Arc::new(OpenAiClient::new(cfg)),
        "mock" => Arc::new(MockClient),
        other => {
            tracing::warn!(provider = other, "unknown llm provider; generation disabled");
            Arc::new(DisabledClient)
        }
    }
}

/// Pull the generated text out of a provider payload.
///
/// Providers disagree on the envelope: a bare string, or an object carrying `response`,
/// `result` or `output_text`. Anything else is handed on as its JSON text so the coercer can
/// still have a go at it.
pub fn extract_text(payload: &Value) -> String {
    if let Some(s) = payload.as_str() {
        if !s.is_empty() {
            return s.to_string();
        }
    }
    for key in ["response", "result", "output_text"] {
        match payload.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return s.clone(),
            Some(v @ Value::Object(_)) => {
                // Some providers nest the envelope one level deeper.
                let inner = extract_text(v);
                if !inner.is_empty() {
                    return inner;
                }
            }
            _ => {}
        }
    }
    payload.to_string()
}

/// Always fails; used when generation is switched off in config.
pub struct DisabledClient;

#[async_trait::async_trait]
impl GenerativeClient for DisabledClient {
    async fn generate(&self, _system: &str, _user: &str) -> Result<String, GenerationError> {
        Err(GenerationError::Disabled)
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Deterministic local stand-in: returns a fixed, schema-valid summary.
pub struct MockClient;

#[async_trait::async_trait]
impl GenerativeClient for MockClient {
    async fn generate(&self, _system: &str, user: &str) -> Result<String, GenerationError> {
        let total = user
            .lines()
            .find_map(|l| l.strip_prefix("TOTAL ITEMS: "))
            .and_then(|n| n.trim().parse::<u64>().ok())
            .unwrap_or(0);
        let date_range = user
            .lines()
            .find_map(|l| l.strip_prefix("DATE RANGE: "))
            .unwrap_or("")
            .to_string();
        let body = serde_json::json!({
            "date_range": date_range,
            "total_items": total,
            "top_themes": [
                {
                    "theme": "Documentation",
                    "summary": "Users find parts of the docs hard to follow.",
                    "sentiment": "negative",
                    "urgency": "medium",
                    "evidence_quote": "docs are confusing"
                },
                {
                    "theme": "Performance",
                    "summary": "Some views feel slow under load.",
                    "sentiment": "negative",
                    "urgency": "high",
                    "evidence_quote": "loads slowly"
                },
                {
                    "theme": "Overall product",
                    "summary": "General satisfaction with room to improve messaging.",
                    "sentiment": "mixed",
                    "urgency": "low",
                    "evidence_quote": "Love the product"
                }
            ]
        });
        Ok(body.to_string())
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_text_prefers_bare_string() {
        assert_eq!(extract_text(&json!("hello")), "hello");
    }

    #[test]
    fn extract_text_walks_known_keys_in_order() {
        assert_eq!(extract_text(&json!({ "response": "a", "result": "b" })), "a");
        assert_eq!(extract_text(&json!({ "result": "b" })), "b");
        assert_eq!(extract_text(&json!({ "output_text": "c" })), "c");
        assert_eq!(
            extract_text(&json!({ "result": { "response": "nested" } })),
            "nested"
        );
    }

    #[test]
    fn extract_text_falls_back_to_json_text() {
        let v = json!({ "weird": 1 });
        assert_eq!(extract_text(&v), r#"{"weird":1}"#);
    }

    #[tokio::test]
    async fn disabled_client_always_errors() {
        let err = DisabledClient.generate("s", "u").await.unwrap_err();
        assert!(matches!(err, GenerationError::Disabled));
    }

    #[tokio::test]
    async fn mock_client_echoes_total_and_range() {
        let out = MockClient
            .generate("s", "DATE RANGE: a to b\nTOTAL ITEMS: 4\n")
            .await
            .unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["total_items"], 4);
        assert_eq!(v["date_range"], "a to b");
        assert_eq!(v["top_themes"].as_array().unwrap().len(), 3);
    }

    const MODE_ENV: &str = "FEEDBACK_LLM_MODE";

    fn enabled(provider: &str) -> LlmConfig {
        LlmConfig {
            enabled: true,
            provider: provider.into(),
            ..LlmConfig::default()
        }
    }

    #[serial_test::serial]
    #[test]
    fn build_client_picks_configured_provider() {
        std::env::remove_var(MODE_ENV);
        assert_eq!(build_client(&enabled("workers-ai")).provider_name(), "workers-ai");
        assert_eq!(build_client(&enabled("openai")).provider_name(), "openai");
        assert_eq!(build_client(&enabled("mock")).provider_name(), "mock");
    }

    #[serial_test::serial]
    #[test]
    fn build_client_disables_when_off_or_unknown() {
        std::env::remove_var(MODE_ENV);
        let off = LlmConfig {
            enabled: false,
            provider: "openai".into(),
            ..LlmConfig::default()
        };
        assert_eq!(build_client(&off).provider_name(), "disabled");
        assert_eq!(build_client(&enabled("llama-farm")).provider_name(), "disabled");
    }

    #[serial_test::serial]
    #[test]
    fn mock_mode_env_overrides_config() {
        std::env::set_var(MODE_ENV, "MOCK");
        let off = build_client(&LlmConfig::default()).provider_name();
        let openai = build_client(&enabled("openai")).provider_name();
        std::env::set_var(MODE_ENV, "live");
        let other_mode = build_client(&enabled("openai")).provider_name();
        std::env::remove_var(MODE_ENV);

        assert_eq!(off, "mock");
        assert_eq!(openai, "mock");
        assert_eq!(other_mode, "openai");
    }
}
