// src/config/mod.rs
//! Service configuration: one TOML file with `[llm]`, `[store]` and `[summary]` sections.

pub mod llm;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use self::llm::LlmConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/feedback_pulse.toml";
pub const ENV_CONFIG_PATH: &str = "FEEDBACK_PULSE_CONFIG";

/// Hard cap on how many records one summary looks at.
pub const MAX_SUMMARY_ITEMS: usize = 12;
pub const MAX_WINDOW_HOURS: i64 = 24 * 366;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sqlite,
    Memory,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/feedback.db")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_backend() -> StoreBackend {
    StoreBackend::Sqlite
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_store_path(),
        }
    }
}

fn default_max_items() -> usize {
    MAX_SUMMARY_ITEMS
}
fn default_window_hours() -> i64 {
    24
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SummaryConfig {
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// Width of the `date_range` label. A label only; records are never filtered by it.
    #[serde(default = "default_window_hours")]
    pub window_hours: i64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            max_items: default_max_items(),
            window_hours: default_window_hours(),
        }
    }
}

impl SummaryConfig {
    fn sanitize(mut self) -> Self {
        self.max_items = self.max_items.clamp(1, MAX_SUMMARY_ITEMS);
        if !(1..=MAX_WINDOW_HOURS).contains(&self.window_hours) {
            self.window_hours = default_window_hours();
        }
        self
    }
}

impl AppConfig {
    /// Load from an explicit path. The file must exist.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&data).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: AppConfig = toml::from_str(s)?;
        cfg.finish()
    }

    /// Load using env var + fallback:
    /// 1) $FEEDBACK_PULSE_CONFIG (must exist)
    /// 2) config/feedback_pulse.toml (optional; defaults when absent)
    pub fn load() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            return Self::load_from_file(PathBuf::from(p));
        }
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default.exists() {
            return Self::load_from_file(default);
        }
        AppConfig::default().finish()
    }

    fn finish(mut self) -> Result<Self> {
        self.llm = self.llm.resolve()?;
        self.summary = self.summary.sanitize();
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = AppConfig::from_toml_str("").unwrap();
        assert!(!cfg.llm.enabled);
        assert_eq!(cfg.llm.provider, "workers-ai");
        assert_eq!(cfg.store.backend, StoreBackend::Sqlite);
        assert_eq!(cfg.summary.max_items, MAX_SUMMARY_ITEMS);
        assert_eq!(cfg.summary.window_hours, 24);
    }

    #[test]
    fn sections_parse_and_clamp() {
        let cfg = AppConfig::from_toml_str(
            r#"
            [llm]
            provider = "Mock"
            enabled = true

            [store]
            backend = "memory"

            [summary]
            max_items = 50
            window_hours = 0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.llm.provider, "mock");
        assert_eq!(cfg.store.backend, StoreBackend::Memory);
        assert_eq!(cfg.summary.max_items, MAX_SUMMARY_ITEMS);
        assert_eq!(cfg.summary.window_hours, 24);
    }

    #[serial_test::serial]
    #[test]
    fn env_path_takes_precedence_and_must_exist() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("custom.toml");
        fs::write(&p, "[summary]\nmax_items = 3\n").unwrap();

        env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        let cfg = AppConfig::load().unwrap();
        assert_eq!(cfg.summary.max_items, 3);

        env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
        assert!(AppConfig::load().is_err());
        env::remove_var(ENV_CONFIG_PATH);
    }
}
