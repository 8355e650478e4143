// src/matching/cascade.rs

use log::trace;
use strsim::normalized_levenshtein;

use crate::matching::index::CandidateIndex;
use crate::matching::normalize::normalize;
use crate::models::CanonicalEntity;

/// Score assigned when either exact map hits.
pub const EXACT_SCORE: f64 = 100.0;

/// A resolved query: the canonical entity it landed on and how strongly.
#[derive(Debug, Clone, Copy)]
pub struct CascadeMatch<'a> {
    pub entity: &'a CanonicalEntity,
    /// 0-100; always 100.0 for exact hits, >= threshold for fuzzy hits
    pub score: f64,
}

/// Order-insensitive similarity on the 0-100 scale: both sides are token
/// sorted before a normalized Levenshtein comparison, so "energy adaro"
/// still scores 100 against "adaro energy".
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    normalized_levenshtein(&sort_tokens(a), &sort_tokens(b)) * 100.0
}

fn sort_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Resolves one query name against the index with the default scorer.
pub fn resolve<'a>(
    query: &str,
    index: &CandidateIndex<'a>,
    threshold: f64,
) -> Option<CascadeMatch<'a>> {
    resolve_with(query, index, threshold, token_sort_ratio)
}

/// Resolves one query name: exact spaced key, then exact no-space key, then
/// a fuzzy scan over the whole index. First hit wins; a fuzzy hit must score
/// at least `threshold`.
///
/// An empty or normalized-to-empty query never matches, so the empty string
/// cannot win a comparison against a registry entry.
pub fn resolve_with<'a, F>(
    query: &str,
    index: &CandidateIndex<'a>,
    threshold: f64,
    scorer: F,
) -> Option<CascadeMatch<'a>>
where
    F: Fn(&str, &str) -> f64,
{
    let key = normalize(Some(query));
    if key.is_empty() {
        return None;
    }

    if let Some(entity) = index.lookup_spaced(&key) {
        return Some(CascadeMatch {
            entity,
            score: EXACT_SCORE,
        });
    }
    if let Some(entity) = index.lookup_no_space(&key) {
        return Some(CascadeMatch {
            entity,
            score: EXACT_SCORE,
        });
    }

    // Fuzzy fallback: linear scan, best score wins, ties go to the earlier
    // index entry (registry order).
    let mut best: Option<CascadeMatch<'a>> = None;
    for (candidate_key, entity) in index.fuzzy_entries() {
        let score = scorer(&key.spaced, candidate_key);
        if best.map_or(true, |b| score > b.score) {
            best = Some(CascadeMatch { entity, score });
        }
    }

    match best {
        Some(m) if m.score >= threshold => {
            trace!(
                "Fuzzy match '{}' -> '{}' at {:.1}",
                query,
                m.entity.name,
                m.score
            );
            Some(m)
        }
        _ => None,
    }
}
