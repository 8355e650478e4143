// tests/pipeline_tests.rs
//
// End-to-end reconciliation scenarios over in-memory input with a memory
// sink: registry reconciliation, tier consumption, license containment.

use std::collections::HashSet;

use reconcile_lib::matching::cascade::token_sort_ratio;
use reconcile_lib::{
    pipeline, CanonicalEntity, CanonicalEntityId, MatchTier, MemorySink, ReconcileConfig,
    RunInput, ScrapedRecord,
};

fn registry() -> Vec<CanonicalEntity> {
    vec![
        CanonicalEntity {
            id: CanonicalEntityId(1),
            name: "PT Adaro Energy Tbk".to_string(),
        },
        CanonicalEntity {
            id: CanonicalEntityId(2),
            name: "PT Bukit Asam Tbk".to_string(),
        },
        CanonicalEntity {
            id: CanonicalEntityId(3),
            name: "PT Vale Indonesia Tbk".to_string(),
        },
    ]
}

fn record(row: usize, name: &str, lat: Option<f64>, lon: Option<f64>) -> ScrapedRecord {
    ScrapedRecord {
        row,
        raw_name: if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        },
        latitude: lat,
        longitude: lon,
        ..Default::default()
    }
}

fn fast_config() -> ReconcileConfig {
    ReconcileConfig {
        sink_flush_pause: std::time::Duration::from_millis(1),
        ..ReconcileConfig::default()
    }
}

#[tokio::test]
async fn scraped_variant_resolves_to_canonical_entity_exactly() {
    let input = RunInput {
        registry: registry(),
        targets: vec![record(0, "ADARO ENERGY", Some(-2.5), Some(113.0))],
        candidates: vec![record(0, "PT Adaro Energy Tbk", Some(-2.5), Some(113.0))],
    };
    let (outcome, sink) = pipeline::run(&input, &fast_config(), MemorySink::default())
        .await
        .unwrap();

    let result = &outcome.results[0];
    assert_eq!(result.tier, MatchTier::Confidence);
    assert_eq!(result.entity_id, Some(CanonicalEntityId(1)));
    assert_eq!(result.entity_name.as_deref(), Some("PT Adaro Energy Tbk"));
    assert_eq!(result.score, Some(100.0));

    // The sink saw the tier, entity, and score cells for row 0.
    let columns: Vec<&str> = sink.cells.iter().map(|c| c.column.as_str()).collect();
    assert!(columns.contains(&"match_tier"));
    assert!(columns.contains(&"matched_entity_id"));
    assert!(columns.contains(&"match_score"));
}

#[tokio::test]
async fn typo_outcome_follows_the_scorer_not_an_assumption() {
    // "Adaro Enerji" against "adaro energy": assert the matched/unmatched
    // outcome from the scorer's actual output against the fixed threshold.
    let cfg = fast_config();
    let score = token_sort_ratio("adaro enerji", "adaro energy");

    let input = RunInput {
        registry: registry(),
        targets: vec![record(0, "Adaro Enerji", None, None)],
        candidates: vec![record(0, "Adaro Enerji", None, None)],
    };
    let (outcome, _) = pipeline::run(&input, &cfg, MemorySink::default())
        .await
        .unwrap();

    let result = &outcome.results[0];
    assert_eq!(result.tier, MatchTier::NameFallback);
    if score >= cfg.fuzzy_threshold {
        assert_eq!(result.entity_id, Some(CanonicalEntityId(1)));
    } else {
        assert_eq!(result.entity_id, None);
    }
}

#[tokio::test]
async fn unrelated_name_ends_unmatched_against_the_registry() {
    let input = RunInput {
        registry: registry(),
        targets: vec![record(0, "Unrelated Trading Co", None, None)],
        candidates: vec![record(0, "Unrelated Trading Co", None, None)],
    };
    let (outcome, _) = pipeline::run(&input, &fast_config(), MemorySink::default())
        .await
        .unwrap();

    // The merge links the rows by name, but the registry has nothing close.
    let result = &outcome.results[0];
    assert_eq!(result.tier, MatchTier::NameFallback);
    assert_eq!(result.entity_id, None);
    assert_eq!(result.score, None);
}

#[tokio::test]
async fn license_polygon_containment_drives_holder_resolution() {
    let mut license = record(0, "ADARO ENERGY", None, None);
    license.polygon_coordinates = Some(
        "[[112.0, -3.5], [114.0, -3.5], [114.0, -1.5], [112.0, -1.5], [112.0, -3.5]]".to_string(),
    );

    let input = RunInput {
        registry: registry(),
        targets: vec![
            record(0, "Site Inside", Some(-2.5), Some(113.0)),
            record(1, "Site Outside", Some(-2.5), Some(118.0)), // 5 degrees east
        ],
        candidates: vec![license],
    };
    let (outcome, sink) = pipeline::run(&input, &fast_config(), MemorySink::default())
        .await
        .unwrap();

    assert_eq!(outcome.licenses[0].license_row, Some(0));
    assert_eq!(
        outcome.licenses[0].holder_entity_id,
        Some(CanonicalEntityId(1))
    );
    assert_eq!(outcome.licenses[1].license_row, None);
    assert_eq!(outcome.summary.licenses_resolved, 1);

    let holder_rows: Vec<usize> = sink
        .cells
        .iter()
        .filter(|c| c.column == "license_holder")
        .map(|c| c.row)
        .collect();
    assert_eq!(holder_rows, vec![0]);
}

#[tokio::test]
async fn a_candidate_consumed_at_the_confidence_tier_is_never_reoffered() {
    // T1 takes C1 by name+coordinate; T2 shares the coordinate key but must
    // not be handed C1 by the coordinate tier.
    let input = RunInput {
        registry: registry(),
        targets: vec![
            record(0, "PT Adaro Energy Tbk", Some(-2.5), Some(113.0)),
            record(1, "Different Site", Some(-2.5), Some(113.0)),
        ],
        candidates: vec![record(0, "ADARO ENERGY", Some(-2.5), Some(113.0))],
    };
    let (outcome, _) = pipeline::run(&input, &fast_config(), MemorySink::default())
        .await
        .unwrap();

    assert_eq!(outcome.results[0].tier, MatchTier::Confidence);
    assert_eq!(outcome.results[0].candidate_row, Some(0));
    assert_eq!(outcome.results[1].tier, MatchTier::None);
    assert_eq!(outcome.results[1].candidate_row, None);
}

#[tokio::test]
async fn consumed_candidates_are_unique_across_a_full_run() {
    let input = RunInput {
        registry: registry(),
        targets: vec![
            record(0, "PT Adaro Energy Tbk", Some(-2.5), Some(113.0)),
            record(1, "bukit asam", None, None),
            record(2, "No Candidate Here", Some(8.0), Some(8.0)),
            record(3, "vale indonesia", Some(-2.0), Some(121.0)),
        ],
        candidates: vec![
            record(0, "ADARO ENERGY", Some(-2.5), Some(113.0)),
            record(1, "PT Bukit Asam Tbk", Some(-3.0), Some(103.0)),
            record(2, "Renamed Operation", Some(-2.0), Some(121.0)),
        ],
    };
    let (outcome, _) = pipeline::run(&input, &fast_config(), MemorySink::default())
        .await
        .unwrap();

    let consumed: Vec<usize> = outcome
        .results
        .iter()
        .filter_map(|r| r.candidate_row)
        .collect();
    let unique: HashSet<usize> = consumed.iter().copied().collect();
    assert_eq!(consumed.len(), unique.len(), "a candidate was consumed twice");

    // Every target reached exactly one terminal state, in input order.
    assert_eq!(outcome.results.len(), 4);
    for (i, r) in outcome.results.iter().enumerate() {
        assert_eq!(r.target_row, i);
        assert_eq!(r.candidate_row.is_some(), r.tier != MatchTier::None);
    }
}

#[tokio::test]
async fn bad_records_never_abort_the_run() {
    let mut broken_geometry = record(0, "PT Adaro Energy Tbk", Some(-2.5), Some(113.0));
    broken_geometry.polygon_coordinates = Some("{{{definitely not json".to_string());

    let input = RunInput {
        registry: registry(),
        targets: vec![
            record(0, "", None, None), // no name, no coordinates
            record(1, "ADARO ENERGY", Some(-2.5), Some(113.0)),
        ],
        candidates: vec![broken_geometry],
    };
    let (outcome, _) = pipeline::run(&input, &fast_config(), MemorySink::default())
        .await
        .unwrap();

    // The run completed with a full result table: the empty record is an
    // explicit unmatched terminal state, the good record still matched.
    assert_eq!(outcome.results.len(), 2);
    assert_eq!(outcome.results[0].tier, MatchTier::None);
    assert_eq!(outcome.results[1].entity_id, Some(CanonicalEntityId(1)));
    assert_eq!(outcome.summary.licenses_resolved, 0);
}

#[tokio::test]
async fn match_rate_summary_reflects_the_result_table() {
    let input = RunInput {
        registry: registry(),
        targets: vec![
            record(0, "adaro energy", None, None),
            record(1, "nobody knows this one", None, None),
        ],
        candidates: vec![record(0, "PT Adaro Energy Tbk", None, None)],
    };
    let (outcome, _) = pipeline::run(&input, &fast_config(), MemorySink::default())
        .await
        .unwrap();

    assert_eq!(outcome.summary.total_targets, 2);
    assert_eq!(outcome.summary.matched_targets, 1);
    assert_eq!(outcome.summary.match_rate_pct(), 50.0);
}
