//! History and trending bookkeeping rules.
//!
//! These functions mutate in-memory lists; loading and saving them is the
//! tracker's job in the app crate. Both lists are most-relevant-first and
//! are truncated to their cap after every mutation.

use crate::category::CategoryTable;
use crate::models::{
    SearchContext, SearchHistoryEntry, SuggestionCategory, Trend, TrendingSearch,
};

/// Record one search of `term` in the history list.
///
/// An exact (case-sensitive) match has its frequency bumped, its timestamp
/// refreshed and is moved to the front; otherwise a new entry is prepended.
/// The list is then truncated to `cap`, dropping from the tail.
pub fn record_history(
    history: &mut Vec<SearchHistoryEntry>,
    term: &str,
    now_ms: i64,
    cap: usize,
) {
    let entry = match history.iter().position(|e| e.term == term) {
        Some(idx) => {
            let mut existing = history.remove(idx);
            existing.frequency += 1;
            existing.timestamp = now_ms;
            existing
        }
        None => SearchHistoryEntry {
            term: term.to_string(),
            category: SuggestionCategory::History,
            frequency: 1,
            timestamp: now_ms,
        },
    };
    history.insert(0, entry);
    history.truncate(cap);
}

/// Record one search of `term` in the global trending table.
///
/// Exact matches gain one count; new terms start at one with a category
/// from `categories`. The table is re-sorted by count (descending, stable)
/// and truncated to `cap`.
pub fn record_trending(
    trending: &mut Vec<TrendingSearch>,
    term: &str,
    categories: &CategoryTable,
    cap: usize,
) {
    match trending.iter_mut().find(|t| t.term == term) {
        Some(existing) => existing.search_count += 1,
        None => trending.push(TrendingSearch {
            term: term.to_string(),
            search_count: 1,
            trend: Trend::Rising,
            category: categories.categorize(term),
        }),
    }
    trending.sort_by(|a, b| b.search_count.cmp(&a.search_count));
    trending.truncate(cap);
}

/// Append a context snapshot to the rolling list, keeping the newest `cap`.
pub fn record_context(contexts: &mut Vec<SearchContext>, context: SearchContext, cap: usize) {
    contexts.push(context);
    if contexts.len() > cap {
        let excess = contexts.len() - cap;
        contexts.drain(..excess);
    }
}
