//! Embedding provider trait and vector utilities.
//!
//! Concrete HTTP providers live in the `cellar-search` app crate. The trait
//! is soft-failing by contract: [`EmbeddingProvider::embed`] returns `None`
//! when no vector can be produced and never surfaces an error.

use async_trait::async_trait;

/// Turns text into a fixed-dimension vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;
    /// Embed `text`, or `None` when no vector is available.
    async fn embed(&self, text: &str) -> Option<Vec<f32>>;
}

/// Provider used when embeddings are not configured. Always yields `None`.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _text: &str) -> Option<Vec<f32>> {
        None
    }
}

/// Truncate `text` to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Cosine similarity of two vectors, or `0.0` when they differ in length,
/// are empty, or either has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (dot, sq_a, sq_b) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, sa, sb), (x, y)| {
            (dot + x * y, sa + x * x, sb + y * y)
        });
    let magnitude = (sq_a * sq_b).sqrt();
    if magnitude < f32::EPSILON {
        0.0
    } else {
        dot / magnitude
    }
}
