//! CLI command runners. Each builds a [`SearchEngine`] from config and
//! prints to stdout; diagnostics go to the tracing subscriber on stderr.

use anyhow::{bail, Context, Result};
use std::path::Path;

use cellar_search_core::category::Category;
use cellar_search_core::models::{ResultType, SearchContext};

use crate::config::Config;
use crate::search::{IndexDocument, SearchEngine, SearchOptions};

pub async fn run_search(config: &Config, query: &str, opts: SearchOptions) -> Result<()> {
    let engine = SearchEngine::from_config(config).await?;
    let response = engine.search(query, &opts).await;

    if response.results.is_empty() {
        println!("No results.");
    }
    for (i, result) in response.results.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} ({})",
            i + 1,
            result.score,
            result.title,
            result.result_type
        );
        if let Some(ref url) = result.url {
            println!("    url: {}", url);
        }
        println!("    excerpt: \"{}\"", result.excerpt.replace('\n', " ").trim());
        if let Some(ref highlights) = result.highlights {
            println!("    highlights: {}", highlights.join(", "));
        }
        println!("    id: {}", result.id);
        println!();
    }

    let stats = &response.stats;
    println!(
        "{} result(s) in {}ms",
        stats.total_results, stats.search_time_ms
    );
    if !stats.suggestions.is_empty() {
        println!("Related: {}", stats.suggestions.join(" | "));
    }
    Ok(())
}

pub async fn run_suggest(
    config: &Config,
    query: &str,
    previous: Option<String>,
    category: Option<Category>,
) -> Result<()> {
    let engine = SearchEngine::from_config(config).await?;
    let mut ctx = SearchContext::for_query(query);
    ctx.previous_query = previous;
    ctx.selected_category = category;

    let suggestions = engine.get_suggestions(ctx.clone()).await;
    engine.record_context(ctx).await?;

    if suggestions.is_empty() {
        println!("No suggestions.");
    }
    for s in &suggestions {
        let icon = s.icon.as_deref().unwrap_or(" ");
        let freq = s.frequency.map(|f| format!(" ×{}", f)).unwrap_or_default();
        println!("{} {:<32} [{}]{}", icon, s.term, s.category.as_str(), freq);
    }
    Ok(())
}

pub async fn run_record(config: &Config, term: &str) -> Result<()> {
    if term.trim().is_empty() {
        bail!("term must not be empty");
    }
    let engine = SearchEngine::from_config(config).await?;
    engine.record_search(term).await?;
    println!("Recorded \"{}\".", term.trim());
    Ok(())
}

pub async fn run_history(config: &Config, clear: bool) -> Result<()> {
    let engine = SearchEngine::from_config(config).await?;
    if clear {
        engine.clear_history().await?;
        println!("History cleared.");
        return Ok(());
    }

    let history = engine.history().await;
    if history.is_empty() {
        println!("No history.");
    }
    for entry in history {
        let when = chrono::DateTime::from_timestamp_millis(entry.timestamp)
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| entry.timestamp.to_string());
        println!("{:>4}  {}  {}", entry.frequency, when, entry.term);
    }
    Ok(())
}

pub async fn run_trending(config: &Config) -> Result<()> {
    let engine = SearchEngine::from_config(config).await?;
    let trending = engine.trending().await;
    if trending.is_empty() {
        println!("No trending searches.");
    }
    for (i, t) in trending.iter().enumerate() {
        println!(
            "{:>3}. {} {:<32} {:>5}  {}",
            i + 1,
            t.trend.icon(),
            t.term,
            t.search_count,
            t.category
        );
    }
    Ok(())
}

/// Read a JSON array of documents from `path`.
pub fn load_documents(path: &Path) -> Result<Vec<IndexDocument>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read documents file: {}", path.display()))?;
    let docs: Vec<IndexDocument> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse documents file: {}", path.display()))?;
    Ok(docs)
}

pub async fn run_index(config: &Config, path: &Path, namespace: Option<&str>) -> Result<()> {
    let docs = load_documents(path)?;
    if docs.is_empty() {
        println!("No documents in {}.", path.display());
        return Ok(());
    }
    if !config.embedding.is_enabled() {
        bail!("Indexing requires embeddings. Set [embedding] provider in config.");
    }

    let engine = SearchEngine::from_config(config).await?;
    let report = engine.index_documents(&docs, namespace).await?;
    println!(
        "Indexed {} document(s), skipped {}.",
        report.upserted, report.skipped
    );
    for id in &report.ids {
        println!("  {}", id);
    }
    Ok(())
}

pub async fn run_delete(config: &Config, ids: &[String], namespace: Option<&str>) -> Result<()> {
    let engine = SearchEngine::from_config(config).await?;
    engine.delete_documents(ids, namespace).await?;
    println!("Deleted {} document(s).", ids.len());
    Ok(())
}

/// Parse repeated `--type` values.
pub fn parse_types(values: &[String]) -> Result<Option<Vec<ResultType>>> {
    if values.is_empty() {
        return Ok(None);
    }
    let types = values
        .iter()
        .map(|v| v.parse::<ResultType>())
        .collect::<Result<Vec<_>>>()?;
    Ok(Some(types))
}
