// src/pipeline.rs
//
// Composes one reconciliation run: index the registry, merge scraped
// candidates onto targets tier by tier, resolve names through the cascade,
// resolve points against license areas, then push the result table through
// the sink. The core stages are pure; only the final write blocks.

use anyhow::{Context, Result};
use chrono::Utc;
use log::{debug, info};
use std::time::Instant;
use uuid::Uuid;

use crate::config::ReconcileConfig;
use crate::geo::license::{self, LicenseResolution};
use crate::matching::cascade::{self, CascadeMatch};
use crate::matching::index::CandidateIndex;
use crate::matching::merge;
use crate::models::{MatchResult, MatchTier, ScrapedRecord};
use crate::results::RunSummary;
use crate::sink::{BatchedWriter, CellWrite, ResultSink};
use crate::source::RunInput;

/// Everything a run produces before the sink write: one result per target
/// in target order, the license resolutions, and the summary.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub results: Vec<MatchResult>,
    pub licenses: Vec<LicenseResolution>,
    pub summary: RunSummary,
}

/// Runs the full resolution over materialized input. Pure with respect to
/// its inputs: a new result collection is produced, the input untouched.
///
/// Always completes with a full result table (one entry per target, possibly
/// unmatched); bad individual records are skipped by the stages that parse
/// them and never abort the run.
pub fn resolve(input: &RunInput, cfg: &ReconcileConfig) -> RunOutcome {
    let started = Instant::now();
    let run_id = Uuid::new_v4().to_string();
    let run_timestamp = Utc::now().naive_utc();
    info!(
        "Reconciliation run {} starting: {} targets, {} candidates, {} registry entries",
        run_id,
        input.targets.len(),
        input.candidates.len(),
        input.registry.len()
    );

    let index = CandidateIndex::build(&input.registry);

    // Tiered merge: link each target to at most one candidate.
    let merge_outcome = merge::run_tiered_merge(&input.targets, &input.candidates, cfg.coord_precision);

    // Name resolution against the registry for every linked target.
    let results: Vec<MatchResult> = merge_outcome
        .links
        .iter()
        .zip(&input.targets)
        .map(|(link, target)| {
            let mut result = MatchResult::unmatched(link.target_row);
            result.candidate_row = link.candidate_row;
            result.tier = link.tier;

            if link.tier == MatchTier::None {
                return result;
            }

            let candidate = link
                .candidate_row
                .and_then(|row| input.candidates.iter().find(|c| c.row == row));
            if let Some(m) = resolve_entity(target, candidate, &index, cfg.fuzzy_threshold) {
                result.entity_id = Some(m.entity.id);
                result.entity_name = Some(m.entity.name.clone());
                result.score = Some(m.score);
            } else {
                debug!(
                    "Target row {}: linked at tier {} but name did not resolve to the registry",
                    link.target_row, link.tier
                );
            }
            result
        })
        .collect();

    // Spatial resolution: which license block does each target sit in.
    let areas = license::build_license_areas(&input.candidates);
    let licenses = license::resolve_licenses(&input.targets, &areas, &index, cfg.fuzzy_threshold);
    let licenses_resolved = licenses.iter().filter(|l| l.license_row.is_some()).count();

    let summary = RunSummary::from_results(
        run_id,
        run_timestamp,
        &results,
        licenses_resolved,
        started.elapsed().as_secs_f64(),
    );

    RunOutcome {
        results,
        licenses,
        summary,
    }
}

/// Resolves the canonical entity for a linked target: the target's own name
/// first, then the linked candidate's, since either side may carry the
/// cleaner spelling.
fn resolve_entity<'a>(
    target: &ScrapedRecord,
    candidate: Option<&ScrapedRecord>,
    index: &CandidateIndex<'a>,
    threshold: f64,
) -> Option<CascadeMatch<'a>> {
    if let Some(name) = target.raw_name.as_deref() {
        if let Some(m) = cascade::resolve(name, index, threshold) {
            return Some(m);
        }
    }
    let name = candidate?.raw_name.as_deref()?;
    cascade::resolve(name, index, threshold)
}

/// Runs the resolution and pushes the result table through the sink.
/// Returns the outcome and the sink (so callers can inspect what was
/// written in tests).
pub async fn run<S: ResultSink>(
    input: &RunInput,
    cfg: &ReconcileConfig,
    sink: S,
) -> Result<(RunOutcome, S)> {
    let outcome = resolve(input, cfg);

    let mut writer = BatchedWriter::new(
        sink,
        cfg.sink_batch_size,
        cfg.sink_flush_pause,
        cfg.sink_max_retries,
        cfg.sink_backoff_cap,
    );

    for result in &outcome.results {
        writer
            .push(CellWrite::new(
                result.target_row,
                "match_tier",
                result.tier.as_str(),
            ))
            .await
            .context("Failed to queue match_tier write")?;
        if let Some(id) = result.entity_id {
            writer
                .push(CellWrite::new(result.target_row, "matched_entity_id", id.to_string()))
                .await
                .context("Failed to queue matched_entity_id write")?;
        }
        if let Some(name) = &result.entity_name {
            writer
                .push(CellWrite::new(result.target_row, "matched_entity_name", name.clone()))
                .await
                .context("Failed to queue matched_entity_name write")?;
        }
        if let Some(score) = result.score {
            writer
                .push(CellWrite::new(
                    result.target_row,
                    "match_score",
                    format!("{:.1}", score),
                ))
                .await
                .context("Failed to queue match_score write")?;
        }
    }
    for resolution in &outcome.licenses {
        if let Some(holder) = &resolution.holder_entity_name {
            writer
                .push(CellWrite::new(
                    resolution.target_row,
                    "license_holder",
                    holder.clone(),
                ))
                .await
                .context("Failed to queue license_holder write")?;
        }
    }

    let sink = writer
        .finish()
        .await
        .context("Failed to flush result sink")?;

    outcome.summary.report();
    Ok((outcome, sink))
}
