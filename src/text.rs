//! UTF-8 helpers
//!
//! Character-aware length, case folding and common-prefix length. Lengths
//! count Unicode scalar values, never bytes, so `"кот"` has length 3.

/// Number of characters (not bytes)
#[inline]
pub fn char_count(s: &str) -> usize {
    s.chars().count()
}

/// Unicode lower-casing (handles Cyrillic including `Ё`)
#[inline]
pub fn to_lower(s: &str) -> String {
    s.to_lowercase()
}

/// Number of leading characters shared by both strings
pub fn common_prefix_len(a: &str, b: &str) -> usize {
    a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count()
}
