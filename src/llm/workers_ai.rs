//! Cloudflare Workers AI provider (REST `ai/run` endpoint).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::openai::{http_client, Msg};
use super::{extract_text, GenerationError, GenerativeClient};
use crate::config::llm::LlmConfig;

const DEFAULT_MODEL: &str = "@cf/meta/llama-3.1-8b-instruct";

pub struct WorkersAiClient {
    http: reqwest::Client,
    account_id: String,
    api_token: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl WorkersAiClient {
    pub fn new(cfg: &LlmConfig) -> Self {
        Self {
            http: http_client(cfg.timeout_secs),
            account_id: cfg.account_id.clone(),
            api_token: cfg.api_key.clone(),
            model: cfg
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "https://api.cloudflare.com/client/v4/accounts/{}/ai/run/{}",
            self.account_id, self.model
        )
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    errors: Vec<ApiMessage>,
}

#[derive(Deserialize)]
struct ApiMessage {
    #[serde(default)]
    message: String,
}

#[async_trait::async_trait]
impl GenerativeClient for WorkersAiClient {
    async fn generate(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        if self.api_token.is_empty() || self.account_id.is_empty() {
            return Err(GenerationError::MissingCredentials("workers-ai"));
        }

        #[derive(Serialize)]
        struct Req<'a> {
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }

        let req = Req {
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                Msg {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let resp = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_token)
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(GenerationError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let env: Envelope = resp.json().await?;
        if !env.success {
            let message = env
                .errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(GenerationError::Provider(if message.is_empty() {
                "workers ai reported failure".to_string()
            } else {
                message
            }));
        }
        if env.result.is_null() {
            return Err(GenerationError::InvalidResponse(
                "empty result in workers ai response".into(),
            ));
        }
        Ok(extract_text(&env.result))
    }

    fn provider_name(&self) -> &'static str {
        "workers-ai"
    }
}
