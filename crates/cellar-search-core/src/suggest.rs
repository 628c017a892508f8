//! Autocomplete suggestions fused from history, trending terms and a static
//! dictionary.
//!
//! # Pipeline
//!
//! 1. Empty query: the top trending terms, nothing else.
//! 2. History entries containing the query (but not equal to it).
//! 3. Trending entries containing the query, with a trend arrow.
//! 4. Dictionary terms: popular terms containing the query and related
//!    terms keyed by the query, both narrowed by the selected category.
//! 5. Fewer than `min_candidates` so far: add popular terms containing the
//!    query with no category filter.
//! 6. Deduplicate by lowercase term, first occurrence wins.
//! 7. With a `previous_query`, boost relevance of terms that continue it:
//!    [`CONTEXT_WORD_BOOST`] for a shared word the current query lacks,
//!    otherwise [`CONTEXT_CATEGORY_BOOST`] for the same non-general bucket.
//!    Relevance stays capped at `1.0`.
//! 8. Rank by relevance + category bonus + frequency bonus, cap the list.

use std::collections::HashSet;

use crate::category::{Category, CategoryTable};
use crate::models::{
    SearchContext, SearchHistoryEntry, SuggestionCategory, SuggestionItem, TrendingSearch,
};

/// Relevance given to dictionary terms reached through a related-term key.
pub const RELATED_RELEVANCE: f64 = 0.5;

/// Boost for a term sharing a word with the previous query.
pub const CONTEXT_WORD_BOOST: f64 = 0.1;

/// Boost for a term in the same category bucket as the previous query.
pub const CONTEXT_CATEGORY_BOOST: f64 = 0.05;

/// Caps for [`generate_suggestions`].
#[derive(Debug, Clone)]
pub struct SuggestOptions {
    pub max_suggestions: usize,
    pub trending_limit: usize,
    pub min_candidates: usize,
}

impl Default for SuggestOptions {
    fn default() -> Self {
        Self {
            max_suggestions: 10,
            trending_limit: 5,
            min_candidates: 3,
        }
    }
}

/// Static dictionary: popular terms plus `key → related terms` pairs.
#[derive(Debug, Clone)]
pub struct RelatedTerms {
    popular: Vec<String>,
    related: Vec<(String, Vec<String>)>,
}

impl RelatedTerms {
    pub fn new(popular: Vec<String>, related: Vec<(String, Vec<String>)>) -> Self {
        let related = related
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        Self { popular, related }
    }

    pub fn popular(&self) -> &[String] {
        &self.popular
    }

    pub fn related(&self) -> &[(String, Vec<String>)] {
        &self.related
    }

    /// Related terms whose key contains, or is contained in, the query.
    fn related_for<'a>(&'a self, query_lower: &'a str) -> impl Iterator<Item = &'a String> + 'a {
        self.related
            .iter()
            .filter(move |(key, _)| {
                query_lower.contains(key.as_str()) || key.contains(query_lower)
            })
            .flat_map(|(_, terms)| terms.iter())
    }
}

impl Default for RelatedTerms {
    fn default() -> Self {
        fn strings(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }

        let popular = strings(&[
            "赤ワイン",
            "白ワイン",
            "スパークリングワイン",
            "シャンパン",
            "ボルドー",
            "ブルゴーニュ",
            "ワイン 初心者",
            "ワイン 飲み比べ",
            "日本酒 おすすめ",
            "純米大吟醸",
            "ウイスキー ハイボール",
            "クラフトビール",
            "ソムリエ試験",
            "ワインエキスパート",
            "テイスティング",
            "red wine",
            "white wine",
            "sparkling wine",
            "pinot noir",
            "cabernet sauvignon",
            "chardonnay",
            "wine pairing",
            "wine tasting basics",
            "sake pairing",
            "single malt whisky",
            "craft beer",
            "sommelier exam",
            "wset level 2",
            "blind tasting game",
            "wine quiz",
        ]);

        let related = vec![
            ("ワイン".to_string(), strings(&["赤ワイン", "白ワイン", "ワイン 初心者"])),
            ("日本酒".to_string(), strings(&["純米酒", "吟醸酒", "日本酒 飲み比べ"])),
            ("ソムリエ".to_string(), strings(&["ソムリエ試験", "ワインエキスパート"])),
            (
                "wine".to_string(),
                strings(&["red wine", "white wine", "wine pairing"]),
            ),
            (
                "whisky".to_string(),
                strings(&["single malt whisky", "bourbon", "highball"]),
            ),
            ("sake".to_string(), strings(&["junmai", "ginjo", "sake pairing"])),
            ("beer".to_string(), strings(&["craft beer", "ipa", "stout"])),
            (
                "sommelier".to_string(),
                strings(&["sommelier exam", "wset level 2", "blind tasting"]),
            ),
            (
                "game".to_string(),
                strings(&["wine quiz", "blind tasting game", "party games"]),
            ),
        ];

        Self::new(popular, related)
    }
}

/// Everything the generator reads from.
#[derive(Debug, Clone, Copy)]
pub struct SuggestionSources<'a> {
    pub history: &'a [SearchHistoryEntry],
    pub trending: &'a [TrendingSearch],
    pub dictionary: &'a RelatedTerms,
    pub categories: &'a CategoryTable,
}

/// How well `term` matches `query`, case-insensitively.
///
/// Exact `1.0`, prefix `0.9`, substring `0.7`, otherwise the fraction of
/// query words found in the term scaled by `0.5`.
pub fn match_score(query: &str, term: &str) -> f64 {
    let q = query.trim().to_lowercase();
    let t = term.trim().to_lowercase();
    if q.is_empty() {
        return 0.0;
    }
    if t == q {
        return 1.0;
    }
    if t.starts_with(&q) {
        return 0.9;
    }
    if t.contains(&q) {
        return 0.7;
    }
    let words: Vec<&str> = q.split_whitespace().collect();
    if words.is_empty() {
        return 0.0;
    }
    let found = words.iter().filter(|w| t.contains(*w)).count();
    found as f64 / words.len() as f64 * 0.5
}

pub fn category_bonus(category: SuggestionCategory) -> f64 {
    match category {
        SuggestionCategory::History => 0.3,
        SuggestionCategory::Trending => 0.2,
        SuggestionCategory::Popular => 0.1,
        SuggestionCategory::Related => 0.0,
    }
}

pub fn frequency_bonus(frequency: Option<u64>) -> f64 {
    frequency.map_or(0.0, |f| (f as f64 / 100.0).min(0.2))
}

/// Final ordering key for a suggestion.
pub fn ranking_score(item: &SuggestionItem) -> f64 {
    item.relevance.unwrap_or(0.0)
        + category_bonus(item.category)
        + frequency_bonus(item.frequency)
}

fn trending_item(idx: usize, t: &TrendingSearch, relevance: Option<f64>) -> SuggestionItem {
    SuggestionItem {
        id: format!("trending-{idx}"),
        term: t.term.clone(),
        category: SuggestionCategory::Trending,
        frequency: Some(t.search_count),
        relevance,
        type_hint: t.category.type_hint(),
        icon: Some(t.trend.icon().to_string()),
    }
}

fn dictionary_item(
    prefix: &str,
    idx: usize,
    term: &str,
    category: SuggestionCategory,
    relevance: f64,
    categories: &CategoryTable,
) -> SuggestionItem {
    SuggestionItem {
        id: format!("{prefix}-{idx}"),
        term: term.to_string(),
        category,
        frequency: None,
        relevance: Some(relevance),
        type_hint: categories.categorize(term).type_hint(),
        icon: None,
    }
}

/// Top trending terms, for an empty query.
pub fn trending_top(trending: &[TrendingSearch], limit: usize) -> Vec<SuggestionItem> {
    dedupe(
        trending
            .iter()
            .enumerate()
            .map(|(i, t)| trending_item(i, t, None))
            .collect(),
    )
    .into_iter()
    .take(limit)
    .collect()
}

/// Stage 2.
pub fn history_candidates(
    query: &str,
    history: &[SearchHistoryEntry],
    categories: &CategoryTable,
) -> Vec<SuggestionItem> {
    let q = query.to_lowercase();
    history
        .iter()
        .enumerate()
        .filter(|(_, e)| {
            let term = e.term.to_lowercase();
            term.contains(&q) && term != q
        })
        .map(|(i, e)| SuggestionItem {
            id: format!("history-{i}"),
            term: e.term.clone(),
            category: SuggestionCategory::History,
            frequency: Some(e.frequency),
            relevance: Some(match_score(query, &e.term)),
            type_hint: categories.categorize(&e.term).type_hint(),
            icon: None,
        })
        .collect()
}

/// Stage 3.
pub fn trending_candidates(query: &str, trending: &[TrendingSearch]) -> Vec<SuggestionItem> {
    let q = query.to_lowercase();
    trending
        .iter()
        .enumerate()
        .filter(|(_, t)| t.term.to_lowercase().contains(&q))
        .map(|(i, t)| trending_item(i, t, Some(match_score(query, &t.term))))
        .collect()
}

/// Stage 4. `selected` narrows terms to one category bucket.
pub fn dictionary_candidates(
    query: &str,
    selected: Option<Category>,
    dictionary: &RelatedTerms,
    categories: &CategoryTable,
) -> Vec<SuggestionItem> {
    let q = query.to_lowercase();
    let in_category = |term: &str| selected.map_or(true, |c| categories.categorize(term) == c);

    let popular = dictionary
        .popular()
        .iter()
        .filter(|t| t.to_lowercase().contains(&q) && in_category(t.as_str()))
        .enumerate()
        .map(|(i, t)| {
            dictionary_item(
                "popular",
                i,
                t,
                SuggestionCategory::Popular,
                match_score(query, t),
                categories,
            )
        });

    let related = dictionary
        .related_for(&q)
        .filter(|t| t.to_lowercase() != q && in_category(t.as_str()))
        .enumerate()
        .map(|(i, t)| {
            dictionary_item(
                "related",
                i,
                t,
                SuggestionCategory::Related,
                RELATED_RELEVANCE,
                categories,
            )
        });

    popular.chain(related).collect()
}

/// Stage 5: popular terms containing the query, ignoring category.
pub fn fallback_candidates(
    query: &str,
    dictionary: &RelatedTerms,
    categories: &CategoryTable,
) -> Vec<SuggestionItem> {
    let q = query.to_lowercase();
    dictionary
        .popular()
        .iter()
        .filter(|t| t.to_lowercase().contains(&q))
        .enumerate()
        .map(|(i, t)| {
            dictionary_item(
                "fallback",
                i,
                t,
                SuggestionCategory::Popular,
                match_score(query, t),
                categories,
            )
        })
        .collect()
}

fn context_words(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .filter(|w| w.chars().count() > 1)
        .map(str::to_string)
        .collect()
}

/// Relevance boost `term` earns from the previous query.
///
/// Words already in the current query are ignored, since every candidate
/// matches those anyway.
pub fn context_boost(
    previous: &str,
    query: &str,
    term: &str,
    categories: &CategoryTable,
) -> f64 {
    if previous.trim().is_empty() {
        return 0.0;
    }
    let current = context_words(query);
    let carried: HashSet<String> = context_words(previous)
        .into_iter()
        .filter(|w| !current.contains(w))
        .collect();
    if context_words(term).iter().any(|w| carried.contains(w)) {
        return CONTEXT_WORD_BOOST;
    }
    let bucket = categories.categorize(previous);
    if bucket != Category::General && categories.categorize(term) == bucket {
        CONTEXT_CATEGORY_BOOST
    } else {
        0.0
    }
}

/// Stage 7.
pub fn apply_context(
    items: &mut [SuggestionItem],
    previous: &str,
    query: &str,
    categories: &CategoryTable,
) {
    for item in items {
        let boost = context_boost(previous, query, &item.term, categories);
        if boost > 0.0 {
            item.relevance = Some((item.relevance.unwrap_or(0.0) + boost).min(1.0));
        }
    }
}

/// Stage 6: keep the first item per lowercase term.
pub fn dedupe(items: Vec<SuggestionItem>) -> Vec<SuggestionItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.term.to_lowercase()))
        .collect()
}

/// Run the full pipeline for the query in `ctx`.
pub fn generate_suggestions(
    ctx: &SearchContext,
    sources: &SuggestionSources<'_>,
    opts: &SuggestOptions,
) -> Vec<SuggestionItem> {
    let query = ctx.current_query.trim();
    if query.is_empty() {
        return trending_top(sources.trending, opts.trending_limit);
    }

    let mut candidates = history_candidates(query, sources.history, sources.categories);
    candidates.extend(trending_candidates(query, sources.trending));
    candidates.extend(dictionary_candidates(
        query,
        ctx.selected_category,
        sources.dictionary,
        sources.categories,
    ));

    if candidates.len() < opts.min_candidates {
        candidates.extend(fallback_candidates(
            query,
            sources.dictionary,
            sources.categories,
        ));
    }

    let mut unique = dedupe(candidates);
    if let Some(previous) = ctx.previous_query.as_deref() {
        apply_context(&mut unique, previous, query, sources.categories);
    }
    unique.sort_by(|a, b| {
        ranking_score(b)
            .partial_cmp(&ranking_score(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    unique.truncate(opts.max_suggestions);
    unique
}
