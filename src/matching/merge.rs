// src/matching/merge.rs
//
// Tiered merge of scraped candidate records onto target records. Three
// passes, precision first, each consuming from a shrinking candidate pool:
//   1. confidence    - normalized name AND rounded coordinates agree
//   2. coordinate    - rounded coordinates alone agree
//   3. name_fallback - normalized name alone agrees
// A candidate consumed by one tier is never offered to a later tier.

use log::{debug, info};
use std::collections::{HashMap, HashSet};

use crate::matching::normalize::normalize_opt;
use crate::models::{MatchTier, ScrapedRecord};

/// How one target ended the merge: linked to a candidate at some tier, or
/// unmatched. Produced in target order; inputs are never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetLink {
    pub target_row: usize,
    pub candidate_row: Option<usize>,
    pub tier: MatchTier,
}

/// Result of a full three-tier merge run.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// One entry per target, in the targets' original order
    pub links: Vec<TargetLink>,

    /// Candidate rows consumed across all tiers (disjoint by construction)
    pub consumed: HashSet<usize>,
}

impl MergeOutcome {
    pub fn matched(&self) -> usize {
        self.links.iter().filter(|l| l.candidate_row.is_some()).count()
    }

    pub fn matched_at(&self, tier: MatchTier) -> usize {
        self.links.iter().filter(|l| l.tier == tier).count()
    }
}

/// Coordinate equality key: both axes rounded to `precision` decimal degrees
/// and scaled to integers so the pair can be hashed and compared exactly.
fn coord_key(record: &ScrapedRecord, precision: u32) -> Option<(i64, i64)> {
    let scale = 10f64.powi(precision as i32);
    let lat = record.latitude?;
    let lon = record.longitude?;
    if !lat.is_finite() || !lon.is_finite() {
        return None;
    }
    Some(((lat * scale).round() as i64, (lon * scale).round() as i64))
}

fn name_key(record: &ScrapedRecord) -> Option<String> {
    let key = normalize_opt(&record.raw_name);
    if key.is_empty() {
        None
    } else {
        Some(key.spaced)
    }
}

/// Builds a join map from key to candidate row over the unconsumed pool.
/// Duplicate keys are pre-deduplicated: the first-encountered candidate
/// represents the key, so one key can only ever consume one candidate.
fn build_join_map<K, F>(
    candidates: &[ScrapedRecord],
    consumed: &HashSet<usize>,
    key_fn: F,
) -> HashMap<K, usize>
where
    K: std::hash::Hash + Eq,
    F: Fn(&ScrapedRecord) -> Option<K>,
{
    let mut map = HashMap::new();
    for candidate in candidates {
        if consumed.contains(&candidate.row) {
            continue;
        }
        if let Some(key) = key_fn(candidate) {
            map.entry(key).or_insert(candidate.row);
        }
    }
    map
}

/// Runs the three merge tiers and stitches the per-tier partial results back
/// onto the original target ordering.
///
/// Every target ends in exactly one terminal state; every candidate row is
/// consumed at most once across the whole run.
pub fn run_tiered_merge(
    targets: &[ScrapedRecord],
    candidates: &[ScrapedRecord],
    coord_precision: u32,
) -> MergeOutcome {
    let mut links: Vec<TargetLink> = targets
        .iter()
        .map(|t| TargetLink {
            target_row: t.row,
            candidate_row: None,
            tier: MatchTier::None,
        })
        .collect();
    let mut consumed: HashSet<usize> = HashSet::new();

    // Tier 1: conjunction of name and coordinate keys.
    {
        let join = build_join_map(candidates, &consumed, |c| {
            Some((name_key(c)?, coord_key(c, coord_precision)?))
        });
        for (slot, target) in links.iter_mut().zip(targets) {
            let key = match (name_key(target), coord_key(target, coord_precision)) {
                (Some(n), Some(c)) => (n, c),
                _ => continue,
            };
            if let Some(&row) = join.get(&key) {
                if consumed.insert(row) {
                    slot.candidate_row = Some(row);
                    slot.tier = MatchTier::Confidence;
                }
            }
        }
        debug!(
            "Merge tier confidence: {} of {} targets linked",
            consumed.len(),
            targets.len()
        );
    }

    // Tier 2: coordinate key alone, over the remaining pool.
    {
        let join = build_join_map(candidates, &consumed, |c| coord_key(c, coord_precision));
        for (slot, target) in links.iter_mut().zip(targets) {
            if slot.candidate_row.is_some() {
                continue;
            }
            let Some(key) = coord_key(target, coord_precision) else {
                continue;
            };
            if let Some(&row) = join.get(&key) {
                if consumed.insert(row) {
                    slot.candidate_row = Some(row);
                    slot.tier = MatchTier::Coordinate;
                }
            }
        }
    }

    // Tier 3: name key alone, one representative candidate per name.
    {
        let join = build_join_map(candidates, &consumed, name_key);
        for (slot, target) in links.iter_mut().zip(targets) {
            if slot.candidate_row.is_some() {
                continue;
            }
            let Some(key) = name_key(target) else {
                continue;
            };
            if let Some(&row) = join.get(&key) {
                if consumed.insert(row) {
                    slot.candidate_row = Some(row);
                    slot.tier = MatchTier::NameFallback;
                }
            }
        }
    }

    let outcome = MergeOutcome { links, consumed };
    let matched = outcome.matched();
    let pct = if targets.is_empty() {
        0.0
    } else {
        matched as f64 * 100.0 / targets.len() as f64
    };
    info!(
        "Tiered merge: {}/{} targets matched ({:.1}%) [confidence={}, coordinate={}, name_fallback={}]",
        matched,
        targets.len(),
        pct,
        outcome.matched_at(MatchTier::Confidence),
        outcome.matched_at(MatchTier::Coordinate),
        outcome.matched_at(MatchTier::NameFallback),
    );
    outcome
}
