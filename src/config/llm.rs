// src/config/llm.rs
use serde::{Deserialize, Serialize};
use std::env;

fn default_provider() -> String {
    "workers-ai".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_temperature() -> f32 {
    0.2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub enabled: bool,
    /// "workers-ai" | "openai" | "mock" (case-insensitive)
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Provider default when absent.
    #[serde(default)]
    pub model: Option<String>,
    /// Cloudflare account id; "ENV" means read CLOUDFLARE_ACCOUNT_ID.
    #[serde(default)]
    pub account_id: String,
    /// "ENV" means: read from CLOUDFLARE_API_TOKEN / OPENAI_API_KEY (by provider)
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_provider(),
            model: None,
            account_id: String::new(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl LlmConfig {
    /// Normalize provider, resolve "ENV" placeholders and clamp numeric knobs.
    /// Placeholders are only resolved for an enabled provider.
    pub fn resolve(mut self) -> anyhow::Result<Self> {
        self.provider = self.provider.trim().to_lowercase();

        if self.enabled {
            if is_env_placeholder(&self.api_key) {
                self.api_key = match self.provider.as_str() {
                    "workers-ai" => env::var("CLOUDFLARE_API_TOKEN")
                        .map_err(|_| anyhow::anyhow!("Missing CLOUDFLARE_API_TOKEN env var"))?,
                    "openai" => env::var("OPENAI_API_KEY")
                        .map_err(|_| anyhow::anyhow!("Missing OPENAI_API_KEY env var"))?,
                    "mock" => String::new(),
                    other => anyhow::bail!("Unsupported provider in config: {other}"),
                };
            }
            if is_env_placeholder(&self.account_id) {
                self.account_id = env::var("CLOUDFLARE_ACCOUNT_ID")
                    .map_err(|_| anyhow::anyhow!("Missing CLOUDFLARE_ACCOUNT_ID env var"))?;
            }
        }

        if self.timeout_secs == 0 {
            self.timeout_secs = default_timeout_secs();
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            self.temperature = default_temperature();
        }
        Ok(self)
    }
}

fn is_env_placeholder(s: &str) -> bool {
    s.trim().eq_ignore_ascii_case("env")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_config_leaves_placeholders_alone() {
        let cfg = LlmConfig {
            provider: " OpenAI ".into(),
            api_key: "ENV".into(),
            ..LlmConfig::default()
        }
        .resolve()
        .unwrap();
        assert_eq!(cfg.provider, "openai");
        assert_eq!(cfg.api_key, "ENV");
    }

    #[serial_test::serial]
    #[test]
    fn enabled_config_resolves_env_key() {
        env::set_var("OPENAI_API_KEY", "sk-test");
        let cfg = LlmConfig {
            enabled: true,
            provider: "openai".into(),
            api_key: "env".into(),
            temperature: 9.0,
            ..LlmConfig::default()
        }
        .resolve()
        .unwrap();
        env::remove_var("OPENAI_API_KEY");
        assert_eq!(cfg.api_key, "sk-test");
        assert_eq!(cfg.temperature, default_temperature());
    }

    #[serial_test::serial]
    #[test]
    fn enabled_config_without_env_key_fails() {
        env::remove_var("CLOUDFLARE_API_TOKEN");
        let err = LlmConfig {
            enabled: true,
            api_key: "ENV".into(),
            ..LlmConfig::default()
        }
        .resolve()
        .unwrap_err();
        assert!(err.to_string().contains("CLOUDFLARE_API_TOKEN"));
    }
}
