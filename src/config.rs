//! TOML configuration parsing and validation.
//!
//! Every command reads the file given by the global `--config` flag. Only
//! `[db]` is required; every other section falls back to the defaults below.
//!
//! ```toml
//! [db]
//! path = "./data/roster.sqlite"
//!
//! [search]
//! endpoint = "http://localhost:8000/api/search"
//! default_model = "gemini-pro"
//! min_score = 25
//!
//! [render]
//! badge_popup_threshold = 30
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::search::RankingModel;

/// Matches scoring below this are dropped before display.
pub const DEFAULT_MIN_SCORE: f64 = 25.0;

/// Match reasons longer than this many characters render as a popup
/// instead of a tooltip.
pub const DEFAULT_BADGE_POPUP_THRESHOLD: usize = 30;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub seed: SeedConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// Ranking proxy that receives the full attendee collection.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Index-backed ranking endpoint; only the query is sent.
    #[serde(default)]
    pub index_endpoint: Option<String>,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_min_score")]
    pub min_score: f64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Candidate count requested from the index-backed endpoint.
    #[serde(default = "default_match_count")]
    pub match_count: usize,
    /// Model the index-backed endpoint uses to explain its candidates:
    /// `gemini-flash`, `gemini-pro` or `claude`.
    #[serde(default = "default_index_analysis_model")]
    pub index_analysis_model: String,
    /// Refuse to search when the selected provider's API key is not set in
    /// the environment. Off by default for proxies that hold their own keys.
    #[serde(default)]
    pub require_api_key: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            index_endpoint: None,
            default_model: default_model(),
            min_score: DEFAULT_MIN_SCORE,
            timeout_secs: default_timeout_secs(),
            match_count: default_match_count(),
            index_analysis_model: default_index_analysis_model(),
            require_api_key: false,
        }
    }
}

fn default_endpoint() -> String {
    "http://localhost:8000/api/search".to_string()
}
fn default_model() -> String {
    "gemini-pro".to_string()
}
fn default_min_score() -> f64 {
    DEFAULT_MIN_SCORE
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_match_count() -> usize {
    50
}
fn default_index_analysis_model() -> String {
    "gemini-flash".to_string()
}

/// Analysis models accepted by the index-backed endpoint.
pub const INDEX_ANALYSIS_MODELS: [&str; 3] = ["gemini-flash", "gemini-pro", "claude"];

#[derive(Debug, Deserialize, Clone)]
pub struct RenderConfig {
    #[serde(default = "default_experience_preview")]
    pub experience_preview: usize,
    #[serde(default = "default_skills_preview")]
    pub skills_preview: usize,
    #[serde(default = "default_badge_popup_threshold")]
    pub badge_popup_threshold: usize,
    #[serde(default = "default_score_high")]
    pub score_high: f64,
    #[serde(default = "default_score_medium")]
    pub score_medium: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            experience_preview: default_experience_preview(),
            skills_preview: default_skills_preview(),
            badge_popup_threshold: DEFAULT_BADGE_POPUP_THRESHOLD,
            score_high: default_score_high(),
            score_medium: default_score_medium(),
        }
    }
}

fn default_experience_preview() -> usize {
    3
}
fn default_skills_preview() -> usize {
    8
}
fn default_badge_popup_threshold() -> usize {
    DEFAULT_BADGE_POPUP_THRESHOLD
}
fn default_score_high() -> f64 {
    75.0
}
fn default_score_medium() -> f64 {
    60.0
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SeedConfig {
    /// JSON array of attendee records fetched once when the store is empty.
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            url: None,
            batch_size: default_batch_size(),
        }
    }
}

fn default_batch_size() -> usize {
    25
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

impl Config {
    /// Defaults with the given database path, for tests and embedding.
    pub fn minimal(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            search: SearchConfig::default(),
            render: RenderConfig::default(),
            seed: SeedConfig::default(),
            sync: SyncConfig::default(),
            server: ServerConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.search.min_score) {
            anyhow::bail!("search.min_score must be in [0, 100]");
        }
        if self.search.default_model.parse::<RankingModel>().is_err() {
            anyhow::bail!(
                "Unknown search.default_model: '{}'. Must be one of: {}",
                self.search.default_model,
                RankingModel::all_ids().join(", ")
            );
        }
        if self.search.match_count == 0 {
            anyhow::bail!("search.match_count must be > 0");
        }
        if !INDEX_ANALYSIS_MODELS.contains(&self.search.index_analysis_model.as_str()) {
            anyhow::bail!(
                "Unknown search.index_analysis_model: '{}'. Must be one of: {}",
                self.search.index_analysis_model,
                INDEX_ANALYSIS_MODELS.join(", ")
            );
        }

        let r = &self.render;
        if r.experience_preview == 0 || r.skills_preview == 0 {
            anyhow::bail!("render preview sizes must be > 0");
        }
        if !(0.0..=100.0).contains(&r.score_high) || !(0.0..=100.0).contains(&r.score_medium) {
            anyhow::bail!("render score buckets must be in [0, 100]");
        }
        if r.score_medium > r.score_high {
            anyhow::bail!("render.score_medium must be <= render.score_high");
        }

        if self.sync.batch_size == 0 {
            anyhow::bail!("sync.batch_size must be > 0");
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_optional_sections() {
        let config: Config = toml::from_str("[db]\npath = \"/tmp/r.sqlite\"\n").unwrap();
        assert_eq!(config.search.min_score, 25.0);
        assert_eq!(config.search.default_model, "gemini-pro");
        assert_eq!(config.render.experience_preview, 3);
        assert_eq!(config.render.skills_preview, 8);
        assert_eq!(config.render.badge_popup_threshold, 30);
        assert_eq!(config.sync.batch_size, 25);
        assert_eq!(config.search.index_analysis_model, "gemini-flash");
        assert!(config.seed.url.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_rejects_unknown_model() {
        let config: Config = toml::from_str(
            "[db]\npath = \"/tmp/r.sqlite\"\n[search]\ndefault_model = \"llama\"\n",
        )
        .unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("llama"));
    }

    #[test]
    fn test_rejects_unknown_index_analysis_model() {
        let mut config = Config::minimal("/tmp/r.sqlite");
        config.search.index_analysis_model = "vector".into();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("index_analysis_model"));

        config.search.index_analysis_model = "claude".into();
        config.validate().unwrap();
    }

    #[test]
    fn test_rejects_inverted_score_buckets() {
        let config: Config = toml::from_str(
            "[db]\npath = \"/tmp/r.sqlite\"\n[render]\nscore_high = 50\nscore_medium = 70\n",
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_floor() {
        let mut config = Config::minimal("/tmp/r.sqlite");
        config.search.min_score = 120.0;
        assert!(config.validate().is_err());
    }
}
