// src/geo/license.rs
//
// Resolves target points against the license-area polygons carried by
// scraped candidate records: which license block is this site inside, and
// which registered company holds it.

use geo::MultiPolygon;
use log::{debug, info, warn};

use crate::geo::polygon::{area_contains, parse_license_geometry};
use crate::geo::projection::project_point;
use crate::matching::cascade;
use crate::matching::index::CandidateIndex;
use crate::models::{CanonicalEntityId, ScrapedRecord};

/// One candidate record's claimed area in projected coordinates, ready for
/// containment tests.
pub struct LicenseArea {
    /// Row of the scraped record that carried the polygon encoding
    pub candidate_row: usize,

    /// License-holder name as scraped, for the reverse name match
    pub holder_name: Option<String>,

    pub area: MultiPolygon<f64>,
}

/// How one target point resolved against the license set.
#[derive(Debug, Clone, PartialEq)]
pub struct LicenseResolution {
    pub target_row: usize,

    /// Row of the first license area containing the point, if any
    pub license_row: Option<usize>,

    /// Canonical entity the license holder's name resolved to, if any
    pub holder_entity_id: Option<CanonicalEntityId>,
    pub holder_entity_name: Option<String>,
    pub holder_score: Option<f64>,
}

/// Parses and projects every candidate's polygon encoding. Records without
/// geometry, and records whose geometry is malformed, are skipped with a log
/// line; one bad entry never aborts the batch.
pub fn build_license_areas(candidates: &[ScrapedRecord]) -> Vec<LicenseArea> {
    let mut areas = Vec::new();
    for candidate in candidates {
        let Some(raw) = candidate.polygon_coordinates.as_deref() else {
            continue;
        };
        match parse_license_geometry(raw) {
            Some(area) => areas.push(LicenseArea {
                candidate_row: candidate.row,
                holder_name: candidate.raw_name.clone(),
                area,
            }),
            None => {
                warn!(
                    "Candidate row {}: license geometry unusable, skipped",
                    candidate.row
                );
            }
        }
    }
    info!(
        "Built {} license areas from {} candidate records",
        areas.len(),
        candidates.len()
    );
    areas
}

/// Tests each target's point against the license areas; the first area that
/// contains the point is accepted. For a hit, the holder's name is resolved
/// through the cascade against the canonical registry.
///
/// Targets without usable coordinates resolve to an explicit miss.
pub fn resolve_licenses(
    targets: &[ScrapedRecord],
    areas: &[LicenseArea],
    index: &CandidateIndex<'_>,
    fuzzy_threshold: f64,
) -> Vec<LicenseResolution> {
    targets
        .iter()
        .map(|target| {
            let mut resolution = LicenseResolution {
                target_row: target.row,
                license_row: None,
                holder_entity_id: None,
                holder_entity_name: None,
                holder_score: None,
            };

            let Some(point) = project_point(target.latitude, target.longitude) else {
                debug!(
                    "Target row {}: no usable coordinates, license resolution skipped",
                    target.row
                );
                return resolution;
            };

            for license in areas {
                if area_contains(&license.area, &point) {
                    resolution.license_row = Some(license.candidate_row);
                    if let Some(holder) = license.holder_name.as_deref() {
                        if let Some(m) = cascade::resolve(holder, index, fuzzy_threshold) {
                            resolution.holder_entity_id = Some(m.entity.id);
                            resolution.holder_entity_name = Some(m.entity.name.clone());
                            resolution.holder_score = Some(m.score);
                        }
                    }
                    break;
                }
            }
            resolution
        })
        .collect()
}
