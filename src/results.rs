// src/results.rs

use chrono::NaiveDateTime;
use log::info;

use crate::models::{MatchResult, MatchTier};

/// Per-tier counts for one run.
#[derive(Debug, Clone)]
pub struct TierStats {
    pub tier: MatchTier,
    pub matched: usize,
}

/// Complete reconciliation run statistics, reported at the end of every run
/// whether or not individual records failed.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: String,
    pub run_timestamp: NaiveDateTime,

    pub total_targets: usize,
    pub matched_targets: usize,
    pub tier_stats: Vec<TierStats>,

    /// Targets whose point fell inside a license area
    pub licenses_resolved: usize,

    pub total_processing_time: f64,
}

impl RunSummary {
    pub fn match_rate_pct(&self) -> f64 {
        if self.total_targets == 0 {
            0.0
        } else {
            self.matched_targets as f64 * 100.0 / self.total_targets as f64
        }
    }

    /// Builds the per-tier breakdown from a finished result table.
    pub fn from_results(
        run_id: String,
        run_timestamp: NaiveDateTime,
        results: &[MatchResult],
        licenses_resolved: usize,
        total_processing_time: f64,
    ) -> Self {
        let count = |tier: MatchTier| results.iter().filter(|r| r.tier == tier).count();
        let tier_stats = vec![
            TierStats {
                tier: MatchTier::Confidence,
                matched: count(MatchTier::Confidence),
            },
            TierStats {
                tier: MatchTier::Coordinate,
                matched: count(MatchTier::Coordinate),
            },
            TierStats {
                tier: MatchTier::NameFallback,
                matched: count(MatchTier::NameFallback),
            },
        ];
        let matched_targets = tier_stats.iter().map(|t| t.matched).sum();
        RunSummary {
            run_id,
            run_timestamp,
            total_targets: results.len(),
            matched_targets,
            tier_stats,
            licenses_resolved,
            total_processing_time,
        }
    }

    /// Human-readable match-rate report, logged at the end of a run.
    pub fn report(&self) {
        info!(
            "Run {} complete: {}/{} targets matched ({:.1}%), {} license areas resolved, {:.2}s",
            self.run_id,
            self.matched_targets,
            self.total_targets,
            self.match_rate_pct(),
            self.licenses_resolved,
            self.total_processing_time
        );
        for stats in &self.tier_stats {
            info!("  tier {:<13} {}", stats.tier.as_str(), stats.matched);
        }
    }
}
