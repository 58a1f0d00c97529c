//! String similarity used for fuzzy reference repair.
//!
//! Similarity is the normalized edit-distance ratio
//! `1 - levenshtein(a, b) / max(len(a), len(b))`, measured in characters, so
//! identical strings score `1.0` and strings sharing nothing score `0.0`.

use std::cmp::Ordering;

/// Levenshtein distance between two strings, in characters.
#[must_use]
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, a_char) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, b_char) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(a_char != *b_char);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

/// Similarity ratio between two strings, in `0.0..=1.0`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn ratio(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

/// Returns up to `limit` members of `pool` whose similarity to `candidate`
/// is at least `cutoff`, best match first.
///
/// Ties are broken by ID so the result does not depend on the iteration
/// order of `pool`.
pub fn close_matches<'a>(
    candidate: &str,
    pool: impl IntoIterator<Item = &'a str>,
    limit: usize,
    cutoff: f64,
) -> Vec<&'a str> {
    let mut scored: Vec<(f64, &str)> = pool
        .into_iter()
        .map(|member| (ratio(candidate, member), member))
        .filter(|(score, _)| *score >= cutoff)
        .collect();

    scored.sort_by(|(a_score, a_id), (b_score, b_id)| {
        b_score
            .partial_cmp(a_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a_id.cmp(b_id))
    });

    scored
        .into_iter()
        .take(limit)
        .map(|(_, member)| member)
        .collect()
}
