//! Data types that flow through the retrieval and suggestion pipeline.
//!
//! Results, stats and suggestions live for a single request. History,
//! trending and context entries are persisted through the
//! [`KvStore`](crate::kv::KvStore) port.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::category::Category;

/// Kind of content a search result points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
    Course,
    Wine,
    Article,
    Faq,
    Game,
}

impl ResultType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultType::Course => "course",
            ResultType::Wine => "wine",
            ResultType::Article => "article",
            ResultType::Faq => "faq",
            ResultType::Game => "game",
        }
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResultType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "course" => Ok(ResultType::Course),
            "wine" => Ok(ResultType::Wine),
            "article" => Ok(ResultType::Article),
            "faq" => Ok(ResultType::Faq),
            "game" => Ok(ResultType::Game),
            other => anyhow::bail!(
                "Unknown result type: '{}'. Use course, wine, article, faq, or game.",
                other
            ),
        }
    }
}

/// A ranked hit returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub result_type: ResultType,
    /// Fused score in `[0.0, 1.0]`.
    pub score: f64,
    pub excerpt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlights: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Statistics produced once per search call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchStats {
    pub total_results: usize,
    pub search_time_ms: u64,
    pub query: String,
    pub suggestions: Vec<String>,
}

/// Results plus stats, the unit handed to downstream consumers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub stats: SearchStats,
}

impl SearchResponse {
    /// Empty response with zeroed stats, echoing the query.
    pub fn empty(query: &str) -> Self {
        Self {
            results: Vec::new(),
            stats: SearchStats {
                query: query.to_string(),
                ..Default::default()
            },
        }
    }
}

/// Where a suggestion came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionCategory {
    History,
    Popular,
    Trending,
    Related,
}

impl SuggestionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionCategory::History => "history",
            SuggestionCategory::Popular => "popular",
            SuggestionCategory::Trending => "trending",
            SuggestionCategory::Related => "related",
        }
    }
}

/// An autocomplete candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionItem {
    pub id: String,
    pub term: String,
    pub category: SuggestionCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<u64>,
    /// Stage relevance plus any previous-query boost, capped to `[0.0, 1.0]`.
    /// Category and frequency bonuses are applied on top when ranking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_hint: Option<ResultType>,
    /// Trend arrow for trending suggestions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

fn history_category() -> SuggestionCategory {
    SuggestionCategory::History
}

/// One remembered query. `term` is the key, compared case-sensitively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHistoryEntry {
    pub term: String,
    #[serde(default = "history_category")]
    pub category: SuggestionCategory,
    pub frequency: u64,
    /// Last time the term was searched, epoch milliseconds.
    pub timestamp: i64,
}

/// Direction of a trending term. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Rising,
    Stable,
    Declining,
}

impl Trend {
    pub fn icon(&self) -> &'static str {
        match self {
            Trend::Rising => "↗",
            Trend::Stable => "→",
            Trend::Declining => "↘",
        }
    }
}

/// Global occurrence count for a term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingSearch {
    pub term: String,
    pub search_count: u64,
    pub trend: Trend,
    pub category: Category,
}

/// Snapshot of the search box, used to seed suggestions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchContext {
    #[serde(default)]
    pub previous_query: Option<String>,
    #[serde(default)]
    pub current_query: String,
    #[serde(default)]
    pub cursor_position: usize,
    #[serde(default)]
    pub selected_category: Option<Category>,
}

impl SearchContext {
    pub fn for_query(query: impl Into<String>) -> Self {
        let current_query = query.into();
        let cursor_position = current_query.chars().count();
        Self {
            current_query,
            cursor_position,
            ..Default::default()
        }
    }
}
