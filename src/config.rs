//! TOML configuration parsing and validation.
//!
//! Every section except `[vector_store]` has defaults, so a minimal file
//! only needs the vector store URL:
//!
//! ```toml
//! [vector_store]
//! url = "https://cellar-index.svc.example.pinecone.io"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cellar_search_core::rank::RankOptions;
use cellar_search_core::store::MetadataLimits;
use cellar_search_core::suggest::{RelatedTerms, SuggestOptions};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub suggestions: SuggestionsConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/cellar.sqlite"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_embedding_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            endpoint: default_embedding_endpoint(),
            api_key_env: default_embedding_key_env(),
            max_input_chars: default_max_input_chars(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_embedding_endpoint() -> String {
    "https://api.openai.com/v1/embeddings".to_string()
}
fn default_embedding_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_max_input_chars() -> usize {
    8000
}
fn default_timeout_secs() -> u64 {
    15
}
fn default_max_retries() -> u32 {
    2
}
fn default_backoff_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorStoreConfig {
    pub url: String,
    #[serde(default = "default_store_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_max_metadata_bytes")]
    pub max_metadata_bytes: usize,
    #[serde(default = "default_max_metadata_keys")]
    pub max_metadata_keys: usize,
}

impl VectorStoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn metadata_limits(&self) -> MetadataLimits {
        MetadataLimits {
            max_bytes: self.max_metadata_bytes,
            max_keys: self.max_metadata_keys,
        }
    }
}

fn default_store_key_env() -> String {
    "PINECONE_API_KEY".to_string()
}
fn default_api_version() -> String {
    "2024-07".to_string()
}
fn default_max_metadata_bytes() -> usize {
    40 * 1024
}
fn default_max_metadata_keys() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_min_score")]
    pub min_score: f64,
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f64,
    #[serde(default = "default_lexical_weight")]
    pub lexical_weight: f64,
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
    #[serde(default = "default_max_highlights")]
    pub max_highlights: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            min_score: default_min_score(),
            vector_weight: default_vector_weight(),
            lexical_weight: default_lexical_weight(),
            excerpt_chars: default_excerpt_chars(),
            max_highlights: default_max_highlights(),
        }
    }
}

impl RetrievalConfig {
    /// Ranking options with this config's weights and the default limit.
    pub fn rank_options(&self) -> RankOptions {
        RankOptions {
            limit: self.default_limit,
            min_score: self.min_score,
            vector_weight: self.vector_weight,
            lexical_weight: self.lexical_weight,
            types: None,
            highlight: false,
            excerpt_chars: self.excerpt_chars,
            max_highlights: self.max_highlights,
        }
    }
}

fn default_limit() -> usize {
    10
}
fn default_min_score() -> f64 {
    0.7
}
fn default_vector_weight() -> f64 {
    0.7
}
fn default_lexical_weight() -> f64 {
    0.3
}
fn default_excerpt_chars() -> usize {
    150
}
fn default_max_highlights() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct SuggestionsConfig {
    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,
    #[serde(default = "default_trending_limit")]
    pub trending_limit: usize,
    #[serde(default = "default_min_candidates")]
    pub min_candidates: usize,
    /// Replaces the built-in popular term list.
    #[serde(default)]
    pub popular_terms: Option<Vec<String>>,
    /// Replaces the built-in related-term table.
    #[serde(default)]
    pub related: Option<BTreeMap<String, Vec<String>>>,
}

impl Default for SuggestionsConfig {
    fn default() -> Self {
        Self {
            max_suggestions: default_max_suggestions(),
            trending_limit: default_trending_limit(),
            min_candidates: default_min_candidates(),
            popular_terms: None,
            related: None,
        }
    }
}

impl SuggestionsConfig {
    pub fn options(&self) -> SuggestOptions {
        SuggestOptions {
            max_suggestions: self.max_suggestions,
            trending_limit: self.trending_limit,
            min_candidates: self.min_candidates,
        }
    }

    /// The static dictionary, with any configured overrides applied.
    pub fn dictionary(&self) -> RelatedTerms {
        if self.popular_terms.is_none() && self.related.is_none() {
            return RelatedTerms::default();
        }
        let builtin = RelatedTerms::default();
        let popular = self
            .popular_terms
            .clone()
            .unwrap_or_else(|| builtin.popular().to_vec());
        let related = self
            .related
            .clone()
            .map(|m| m.into_iter().collect())
            .unwrap_or_else(|| builtin.related().to_vec());
        RelatedTerms::new(popular, related)
    }
}

fn default_max_suggestions() -> usize {
    10
}
fn default_trending_limit() -> usize {
    5
}
fn default_min_candidates() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    #[serde(default = "default_max_trending")]
    pub max_trending: usize,
    #[serde(default = "default_max_context")]
    pub max_context: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            max_trending: default_max_trending(),
            max_context: default_max_context(),
        }
    }
}

fn default_max_history() -> usize {
    50
}
fn default_max_trending() -> usize {
    100
}
fn default_max_context() -> usize {
    10
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
    "127.0.0.1:7431".to_string()
}

impl Config {
    /// Defaults everywhere, with a placeholder vector store URL.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig::default(),
            embedding: EmbeddingConfig::default(),
            vector_store: VectorStoreConfig {
                url: "http://127.0.0.1:5081".to_string(),
                api_key_env: default_store_key_env(),
                api_version: default_api_version(),
                namespace: String::new(),
                timeout_secs: default_timeout_secs(),
                max_retries: default_max_retries(),
                backoff_ms: default_backoff_ms(),
                max_metadata_bytes: default_max_metadata_bytes(),
                max_metadata_keys: default_max_metadata_keys(),
            },
            retrieval: RetrievalConfig::default(),
            suggestions: SuggestionsConfig::default(),
            history: HistoryConfig::default(),
            server: ServerConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        if r.default_limit < 1 {
            bail!("retrieval.default_limit must be >= 1");
        }
        if !(0.0..=1.0).contains(&r.min_score) {
            bail!("retrieval.min_score must be in [0.0, 1.0]");
        }
        if !(0.0..=1.0).contains(&r.vector_weight) || !(0.0..=1.0).contains(&r.lexical_weight) {
            bail!("retrieval weights must be in [0.0, 1.0]");
        }
        if (r.vector_weight + r.lexical_weight - 1.0).abs() > 1e-6 {
            bail!(
                "retrieval.vector_weight + retrieval.lexical_weight must equal 1.0 (got {})",
                r.vector_weight + r.lexical_weight
            );
        }

        let h = &self.history;
        if h.max_history < 1 || h.max_trending < 1 || h.max_context < 1 {
            bail!("history caps must be >= 1");
        }
        if self.suggestions.max_suggestions < 1 {
            bail!("suggestions.max_suggestions must be >= 1");
        }

        if self.vector_store.url.trim().is_empty() {
            bail!("vector_store.url must be set");
        }

        match self.embedding.provider.as_str() {
            "disabled" | "openai" => {}
            other => bail!(
                "Unknown embedding provider: '{}'. Must be disabled or openai.",
                other
            ),
        }
        if self.embedding.is_enabled() {
            if self.embedding.dims.is_none() || self.embedding.dims == Some(0) {
                bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    self.embedding.provider
                );
            }
            if self.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    self.embedding.provider
                );
            }
        }

        Ok(())
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}
