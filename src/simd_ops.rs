//! Vector Operations
//!
//! Dot product, L2 norm and normalization over unit-length word vectors, plus
//! partial top-k selection for nearest-neighbour queries.
//!
//! The dot product accumulates eight independent lanes so the compiler can
//! vectorize it without target-specific intrinsics. Lane order is fixed, so
//! `dot_product(a, b) == dot_product(b, a)` bit for bit.

use std::cmp::Ordering;

const LANES: usize = 8;

/// Dot product of two vectors. Mismatched lengths use the shorter prefix.
#[inline]
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    let (a, b) = (&a[..len], &b[..len]);

    let mut acc = [0.0f32; LANES];
    let mut a_chunks = a.chunks_exact(LANES);
    let mut b_chunks = b.chunks_exact(LANES);

    for (ca, cb) in a_chunks.by_ref().zip(b_chunks.by_ref()) {
        for i in 0..LANES {
            acc[i] += ca[i] * cb[i];
        }
    }

    let tail: f32 = a_chunks
        .remainder()
        .iter()
        .zip(b_chunks.remainder())
        .map(|(x, y)| x * y)
        .sum();

    acc.iter().sum::<f32>() + tail
}

/// L2 norm (magnitude)
#[inline]
pub fn l2_norm(v: &[f32]) -> f32 {
    dot_product(v, v).sqrt()
}

/// Scale to unit length in place. Zero vectors are left untouched; a vector
/// whose norm is not finite is zeroed.
pub fn normalize(v: &mut [f32]) {
    let norm = l2_norm(v);
    if !norm.is_finite() {
        v.fill(0.0);
    } else if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

fn by_score_desc<T>(a: &(T, f32), b: &(T, f32)) -> Ordering {
    b.1.total_cmp(&a.1)
}

/// Keep the `k` highest-scoring items, sorted descending.
///
/// Uses a selection pass before sorting so only `k` items get sorted.
pub fn top_k<T>(mut scored: Vec<(T, f32)>, k: usize) -> Vec<(T, f32)> {
    if k == 0 || scored.is_empty() {
        return Vec::new();
    }
    if k < scored.len() {
        scored.select_nth_unstable_by(k - 1, by_score_desc);
        scored.truncate(k);
    }
    scored.sort_by(by_score_desc);
    scored
}
