//! Edit-distance and bigram-overlap similarity between canonical strings.

use crate::normalize::normalize_text;
use rapidfuzz::distance::levenshtein;
use std::collections::HashMap;

/// Unit-cost Levenshtein distance counted in chars.
pub fn edit_distance(a: &str, b: &str) -> usize {
    levenshtein::distance(a.chars(), b.chars())
}

/// `(maxLen - distance) / maxLen` over the canonical forms of `a` and `b`.
///
/// Identical canonical forms score 1.0 (this includes two strings that both
/// normalize to nothing); otherwise an empty side scores 0.0.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize_text(a);
    let b = normalize_text(b);
    canonical_similarity(a.as_str(), b.as_str())
}

/// [`similarity`] for strings that are already canonical.
pub fn canonical_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let max_len = a.chars().count().max(b.chars().count());
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let distance = edit_distance(a, b);
    (max_len - distance.min(max_len)) as f64 / max_len as f64
}

/// Every contiguous pair of chars; empty when `s` has fewer than two.
pub fn bigrams(s: &str) -> Vec<(char, char)> {
    let chars: Vec<char> = s.chars().collect();
    chars.windows(2).map(|pair| (pair[0], pair[1])).collect()
}

/// Dice coefficient over bigram multisets.
pub fn bigram_similarity(a: &str, b: &str) -> f64 {
    let left = bigrams(a);
    let right = bigrams(b);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let mut counts: HashMap<(char, char), usize> = HashMap::with_capacity(left.len());
    for pair in &left {
        *counts.entry(*pair).or_insert(0) += 1;
    }
    let mut shared = 0usize;
    for pair in &right {
        if let Some(count) = counts.get_mut(pair)
            && *count > 0
        {
            *count -= 1;
            shared += 1;
        }
    }
    (2 * shared) as f64 / (left.len() + right.len()) as f64
}
