//! Hybrid ranking: fuse vector similarity with lexical matching.
//!
//! # Scoring
//!
//! 1. Drop vector matches scoring below `min_score`.
//! 2. Drop results whose type is not in the requested type filter.
//! 3. Lexical score = fraction of query words (longer than one character)
//!    found case-insensitively in the content, or `1.0` when the whole query
//!    appears verbatim.
//! 4. `fused = vector_weight × vector + lexical_weight × lexical`, clamped
//!    to `[0, 1]`.
//! 5. Stable sort by fused score (descending), so ties keep the vector
//!    store's order. Truncate to `limit`.
//! 6. Build an excerpt and, if requested, highlight terms per result.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};

use crate::models::{ResultType, SearchResult};
use crate::store::VectorMatch;

/// Knobs for [`rank_matches`].
#[derive(Debug, Clone)]
pub struct RankOptions {
    pub limit: usize,
    pub min_score: f64,
    pub vector_weight: f64,
    pub lexical_weight: f64,
    /// Keep only these result types. `None` keeps everything.
    pub types: Option<Vec<ResultType>>,
    pub highlight: bool,
    pub excerpt_chars: usize,
    pub max_highlights: usize,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            min_score: 0.7,
            vector_weight: 0.7,
            lexical_weight: 0.3,
            types: None,
            highlight: false,
            excerpt_chars: 150,
            max_highlights: 5,
        }
    }
}

/// Metadata keys lifted into [`SearchResult`] fields.
const RESERVED_KEYS: [&str; 5] = ["title", "content", "text", "type", "url"];

const ELLIPSIS: &str = "...";

/// Query words that take part in word-level matching.
fn match_words(query_lower: &str) -> Vec<&str> {
    query_lower
        .split_whitespace()
        .filter(|w| w.chars().count() > 1)
        .collect()
}

/// Lexical score of `content` for `query`, in `[0, 1]`.
pub fn lexical_score(query: &str, content: &str) -> f64 {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return 0.0;
    }
    let content = content.to_lowercase();
    if content.contains(&query) {
        return 1.0;
    }
    let words = match_words(&query);
    if words.is_empty() {
        return 0.0;
    }
    let found = words.iter().filter(|w| content.contains(*w)).count();
    found as f64 / words.len() as f64
}

/// Weighted fusion of a vector score and a lexical score, clamped to `[0, 1]`.
pub fn fuse(vector_score: f64, lexical: f64, vector_weight: f64, lexical_weight: f64) -> f64 {
    let v = vector_score.clamp(0.0, 1.0);
    let l = lexical.clamp(0.0, 1.0);
    (vector_weight * v + lexical_weight * l).clamp(0.0, 1.0)
}

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!?\[([^\]]*)\]\([^)]*\)").expect("valid regex"));
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s{0,3}#{1,6}\s+").expect("valid regex"));
static EMPHASIS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[*`~]+|\b__|__\b").expect("valid regex"));
static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Remove HTML tags and common Markdown markers, collapsing whitespace.
pub fn strip_markup(text: &str) -> String {
    let text = TAG_RE.replace_all(text, " ");
    let text = LINK_RE.replace_all(&text, "$1");
    let text = HEADING_RE.replace_all(&text, "");
    let text = EMPHASIS_RE.replace_all(&text, "");
    SPACE_RE.replace_all(&text, " ").trim().to_string()
}

fn is_sentence_end(c: char) -> bool {
    matches!(c, '。' | '！' | '？' | '.' | '!' | '?')
}

/// Split on sentence punctuation followed by whitespace. Whitespace between
/// sentences is dropped; punctuation stays with its sentence.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        let next_is_space = chars.peek().is_some_and(|(_, n)| n.is_whitespace());
        if is_sentence_end(c) && next_is_space {
            let end = idx + c.len_utf8();
            sentences.push(&text[start..end]);
            while let Some((_, n)) = chars.peek() {
                if !n.is_whitespace() {
                    break;
                }
                chars.next();
            }
            start = chars.peek().map_or(text.len(), |(i, _)| *i);
        }
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}

/// Build a display excerpt of at most `max_chars` characters plus an ellipsis.
///
/// Content that fits is returned whole. Otherwise whole sentences are kept
/// while they fit; when not even the first sentence fits the text is cut at
/// `max_chars` characters.
pub fn excerpt(content: &str, max_chars: usize) -> String {
    let text = strip_markup(content);
    if text.chars().count() <= max_chars {
        return text;
    }

    let mut out = String::new();
    let mut used = 0usize;
    for sentence in split_sentences(&text) {
        let sep = usize::from(!out.is_empty());
        let len = sentence.chars().count();
        if used + sep + len > max_chars {
            break;
        }
        if sep == 1 {
            out.push(' ');
        }
        out.push_str(sentence);
        used += sep + len;
    }

    if out.is_empty() {
        out = text.chars().take(max_chars).collect();
    }
    out.push_str(ELLIPSIS);
    out
}

/// Case-insensitive matches of each query word (longer than one character)
/// in `content`, as they appear in the content. Deduplicated, at most `max`.
pub fn highlight_terms(query: &str, content: &str, max: usize) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for word in query.split_whitespace().filter(|w| w.chars().count() > 1) {
        let Ok(re) = RegexBuilder::new(&regex::escape(word))
            .case_insensitive(true)
            .build()
        else {
            continue;
        };
        for m in re.find_iter(content) {
            if terms.len() >= max {
                return terms;
            }
            if !terms.iter().any(|t| t == m.as_str()) {
                terms.push(m.as_str().to_string());
            }
        }
    }
    terms.truncate(max);
    terms
}

fn string_field(metadata: &Map<String, Value>, key: &str) -> Option<String> {
    metadata.get(key).and_then(Value::as_str).map(str::to_string)
}

/// A vector match whose metadata has been lifted into result fields.
struct Candidate {
    id: String,
    title: String,
    content: String,
    result_type: ResultType,
    url: Option<String>,
    metadata: Map<String, Value>,
    vector_score: f64,
}

impl Candidate {
    fn from_match(m: VectorMatch) -> Self {
        let title = string_field(&m.metadata, "title").unwrap_or_default();
        let content = string_field(&m.metadata, "content")
            .or_else(|| string_field(&m.metadata, "text"))
            .unwrap_or_default();
        let result_type = string_field(&m.metadata, "type")
            .and_then(|t| t.parse().ok())
            .unwrap_or(ResultType::Article);
        let url = string_field(&m.metadata, "url");
        let metadata = m
            .metadata
            .into_iter()
            .filter(|(k, _)| !RESERVED_KEYS.contains(&k.as_str()))
            .collect();
        Self {
            id: m.id,
            title,
            content,
            result_type,
            url,
            metadata,
            vector_score: m.score,
        }
    }
}

/// Rank vector matches for `query`. Input order is the store's ranking.
pub fn rank_matches(
    query: &str,
    matches: Vec<VectorMatch>,
    opts: &RankOptions,
) -> Vec<SearchResult> {
    let mut scored: Vec<(Candidate, f64)> = matches
        .into_iter()
        .filter(|m| m.score >= opts.min_score)
        .map(Candidate::from_match)
        .filter(|c| {
            opts.types
                .as_ref()
                .map_or(true, |types| types.contains(&c.result_type))
        })
        .map(|c| {
            let lexical = lexical_score(query, &c.content);
            let fused = fuse(c.vector_score, lexical, opts.vector_weight, opts.lexical_weight);
            (c, fused)
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(opts.limit);

    scored
        .into_iter()
        .map(|(c, score)| {
            let highlights = opts
                .highlight
                .then(|| highlight_terms(query, &c.content, opts.max_highlights));
            SearchResult {
                excerpt: excerpt(&c.content, opts.excerpt_chars),
                id: c.id,
                title: c.title,
                content: c.content,
                result_type: c.result_type,
                score,
                highlights,
                url: c.url,
                metadata: c.metadata,
            }
        })
        .collect()
}
