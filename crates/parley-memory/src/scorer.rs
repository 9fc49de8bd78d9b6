//! Lexical scoring: cosine similarity over term-frequency vectors.

use crate::error::{Error, Result};
use crate::types::{MemoryQuery, MemoryRecord, ScoredMemory};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static WORD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}]+").expect("WORD_REGEX is a compile-time constant"));

/// Lowercased word frequencies of `text`.
pub fn term_frequencies(text: &str) -> HashMap<String, f32> {
    let mut counts = HashMap::new();
    for word in WORD_REGEX.find_iter(text) {
        *counts.entry(word.as_str().to_lowercase()).or_insert(0.0) += 1.0;
    }
    counts
}

/// Cosine similarity between two term-frequency vectors.
///
/// Returns 0.0 when either side has no terms.
pub fn cosine(a: &HashMap<String, f32>, b: &HashMap<String, f32>) -> f32 {
    let dot: f32 = a
        .iter()
        .filter_map(|(term, wa)| b.get(term).map(|wb| wa * wb))
        .sum();
    let norm_a = a.values().map(|w| w * w).sum::<f32>().sqrt();
    let norm_b = b.values().map(|w| w * w).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Filter, score, and rank `records` for `query`.
///
/// Memories sharing no term with the query are never returned. Ties keep
/// insertion order.
pub fn rank<'a>(
    query: &MemoryQuery,
    records: impl IntoIterator<Item = &'a MemoryRecord>,
) -> Result<Vec<ScoredMemory>> {
    let query_terms = term_frequencies(&query.text);
    if query_terms.is_empty() {
        return Err(Error::InvalidQuery("query text has no searchable terms".into()));
    }

    let threshold = query.score_threshold.unwrap_or(0.0);
    let mut scored: Vec<ScoredMemory> = records
        .into_iter()
        .filter(|record| record.matches(&query.filter))
        .filter_map(|record| {
            let score = cosine(&query_terms, &term_frequencies(&record.content));
            (score > 0.0 && score >= threshold).then(|| ScoredMemory {
                record: record.clone(),
                score,
            })
        })
        .collect();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(query.k);
    Ok(scored)
}
