//! Similarity Engine
//!
//! Cosine similarity between two dictionary words. Embeddings are unit length,
//! so the cosine is a plain dot product. Words with the same POS tag get a
//! 10% boost before the score is clamped to `[0, 1]`.

use crate::dictionary::DictionaryStore;
use crate::error::WordNotFound;
use crate::simd_ops::dot_product;
use crate::types::WordEntry;

/// Multiplier applied when both words carry the same POS tag
pub const SAME_POS_BOOST: f32 = 1.1;

/// Boosted, clamped similarity of two resolved entries
#[inline]
pub fn entry_similarity(a: &WordEntry, b: &WordEntry) -> f32 {
    let mut score = dot_product(a.embedding(), b.embedding());
    if a.pos() == b.pos() {
        score *= SAME_POS_BOOST;
    }
    score.clamp(0.0, 1.0)
}

/// Similarity of two tokens in `[0, 1]`.
///
/// Identical tokens score `1.0` without a lookup. Symmetric in its arguments.
pub fn similarity(store: &DictionaryStore, a: &str, b: &str) -> Result<f32, WordNotFound> {
    if a == b {
        return Ok(1.0);
    }
    let first = store.find(a).ok_or_else(|| WordNotFound(a.to_string()))?;
    let second = store.find(b).ok_or_else(|| WordNotFound(b.to_string()))?;
    Ok(entry_similarity(first, second))
}
