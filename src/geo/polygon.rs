// src/geo/polygon.rs
//
// Builds projected license-area geometry from the raw coordinate encodings
// scraped sources carry: bare nested arrays of [lon, lat] pairs (one ring,
// a ring list, or a polygon list) or a GeoJSON-style envelope. Malformed
// entries become "no geometry"; they never abort the batch.

use geo::{Area, BooleanOps, Contains, Coord, LineString, MultiPolygon, Point, Polygon};
use log::warn;
use serde_json::Value;

use crate::geo::projection::project_lon_lat;

/// Parses a JSON-encoded coordinate structure into one projected, repaired
/// multi-polygon. Multiple polygons in the encoding are unioned into a
/// single geometry representing the record's full claimed area.
///
/// Returns `None` (logging at warn) when the encoding is malformed or the
/// geometry collapses to nothing after repair.
pub fn parse_license_geometry(raw: &str) -> Option<MultiPolygon<f64>> {
    let value: Value = match serde_json::from_str(raw.trim()) {
        Ok(v) => v,
        Err(e) => {
            warn!("Unparseable polygon JSON ({}), skipping entry", e);
            return None;
        }
    };

    let polygons = extract_polygon_rings(&value)?;
    let mut unioned: Option<MultiPolygon<f64>> = None;
    for rings in polygons {
        let Some(polygon) = build_polygon(&rings) else {
            continue;
        };
        let repaired = repair(polygon);
        if repaired.0.is_empty() {
            continue;
        }
        unioned = Some(match unioned {
            Some(acc) => acc.union(&repaired),
            None => repaired,
        });
    }

    match unioned {
        Some(mp) if mp.unsigned_area() > 0.0 => Some(mp),
        _ => {
            warn!("Polygon entry produced empty geometry after repair, skipping");
            None
        }
    }
}

/// A ring is a list of projected coordinates; a polygon is its ring list
/// (exterior first). This intermediate form keeps parsing separate from
/// geometry construction.
type Ring = Vec<Coord<f64>>;

/// Normalizes the accepted encodings to a list of polygons, each a list of
/// rings. Accepts:
///  - {"type": "Polygon", "coordinates": [...]} and the MultiPolygon form
///  - [[x,y], ...]                 one bare ring
///  - [[[x,y], ...], ...]          one polygon as a ring list
///  - [[[[x,y], ...], ...], ...]   a polygon list
fn extract_polygon_rings(value: &Value) -> Option<Vec<Vec<Ring>>> {
    let coordinates = match value {
        Value::Object(obj) => {
            let geom_type = obj.get("type").and_then(Value::as_str).unwrap_or("");
            let coords = obj.get("coordinates")?;
            return match geom_type {
                "Polygon" => Some(vec![parse_ring_list(coords)?]),
                "MultiPolygon" => {
                    let arr = coords.as_array()?;
                    let polys: Vec<Vec<Ring>> =
                        arr.iter().filter_map(parse_ring_list).collect();
                    if polys.is_empty() {
                        None
                    } else {
                        Some(polys)
                    }
                }
                other => {
                    warn!("Unsupported geometry type '{}', skipping entry", other);
                    None
                }
            };
        }
        Value::Array(_) => value,
        _ => return None,
    };

    match nesting_depth(coordinates) {
        // [[x,y],...]: a single ring
        2 => Some(vec![vec![parse_ring(coordinates)?]]),
        // [[[x,y],...],...]: one polygon's rings
        3 => Some(vec![parse_ring_list(coordinates)?]),
        // [[[[x,y],...],...],...]: several polygons
        4 => {
            let arr = coordinates.as_array()?;
            let polys: Vec<Vec<Ring>> = arr.iter().filter_map(parse_ring_list).collect();
            if polys.is_empty() {
                None
            } else {
                Some(polys)
            }
        }
        depth => {
            warn!("Unexpected coordinate nesting depth {}, skipping entry", depth);
            None
        }
    }
}

/// Depth of array nesting until the first scalar, used to disambiguate the
/// bare-array encodings.
fn nesting_depth(value: &Value) -> usize {
    let mut depth = 0;
    let mut cursor = value;
    while let Some(arr) = cursor.as_array() {
        depth += 1;
        match arr.first() {
            Some(inner) => cursor = inner,
            None => break,
        }
    }
    depth
}

fn parse_ring_list(value: &Value) -> Option<Vec<Ring>> {
    let arr = value.as_array()?;
    let rings: Vec<Ring> = arr.iter().filter_map(parse_ring).collect();
    if rings.is_empty() {
        None
    } else {
        Some(rings)
    }
}

/// Parses one ring of [lon, lat] pairs, projecting each vertex. Pairs that
/// fail to parse or project are dropped; a ring below three usable vertices
/// is discarded.
fn parse_ring(value: &Value) -> Option<Ring> {
    let arr = value.as_array()?;
    let mut ring = Vec::with_capacity(arr.len());
    for pair in arr {
        let Some(coords) = pair.as_array() else {
            continue;
        };
        if coords.len() < 2 {
            continue;
        }
        let (Some(lon), Some(lat)) = (coords[0].as_f64(), coords[1].as_f64()) else {
            continue;
        };
        let Some((x, y)) = project_lon_lat(lon, lat) else {
            continue;
        };
        ring.push(Coord { x, y });
    }
    if ring.len() < 3 {
        warn!("Ring with fewer than 3 usable vertices, discarded");
        return None;
    }
    Some(ring)
}

fn build_polygon(rings: &[Ring]) -> Option<Polygon<f64>> {
    let (exterior, interiors) = rings.split_first()?;
    Some(Polygon::new(
        LineString::from(exterior.clone()),
        interiors.iter().map(|r| LineString::from(r.clone())).collect(),
    ))
}

/// Repairs a possibly self-intersecting polygon by unioning it with itself.
/// The boolean-ops backend re-noodles crossing edges into valid rings, the
/// same effect a zero-distance buffer has. Degenerate input comes back as
/// an empty multi-polygon, which callers treat as "no geometry".
fn repair(polygon: Polygon<f64>) -> MultiPolygon<f64> {
    let mp = MultiPolygon::new(vec![polygon]);
    mp.union(&mp)
}

/// Point-in-polygon test in the shared projected CRS.
pub fn area_contains(area: &MultiPolygon<f64>, point: &Point<f64>) -> bool {
    area.contains(point)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::projection::project_point;

    /// A square license block enclosing (lat=-2.5, lon=113.0).
    fn enclosing_square() -> &'static str {
        "[[112.0, -3.5], [114.0, -3.5], [114.0, -1.5], [112.0, -1.5], [112.0, -3.5]]"
    }

    #[test]
    fn bare_ring_contains_interior_point() {
        let area = parse_license_geometry(enclosing_square()).unwrap();
        let inside = project_point(Some(-2.5), Some(113.0)).unwrap();
        let outside = project_point(Some(-7.5), Some(113.0)).unwrap();
        assert!(area_contains(&area, &inside));
        assert!(!area_contains(&area, &outside));
    }

    #[test]
    fn geojson_polygon_envelope_is_accepted() {
        let raw = format!(
            "{{\"type\": \"Polygon\", \"coordinates\": [{}]}}",
            enclosing_square()
        );
        let area = parse_license_geometry(&raw).unwrap();
        let inside = project_point(Some(-2.5), Some(113.0)).unwrap();
        assert!(area_contains(&area, &inside));
    }

    #[test]
    fn multipolygon_unions_all_parts() {
        // Two disjoint blocks; a point in each must test inside.
        let raw = r#"{"type": "MultiPolygon", "coordinates": [
            [[[112.0, -3.0], [113.0, -3.0], [113.0, -2.0], [112.0, -2.0], [112.0, -3.0]]],
            [[[115.0, -3.0], [116.0, -3.0], [116.0, -2.0], [115.0, -2.0], [115.0, -3.0]]]
        ]}"#;
        let area = parse_license_geometry(raw).unwrap();
        let in_first = project_point(Some(-2.5), Some(112.5)).unwrap();
        let in_second = project_point(Some(-2.5), Some(115.5)).unwrap();
        let between = project_point(Some(-2.5), Some(114.0)).unwrap();
        assert!(area_contains(&area, &in_first));
        assert!(area_contains(&area, &in_second));
        assert!(!area_contains(&area, &between));
    }

    #[test]
    fn self_intersecting_ring_is_repaired_or_dropped_never_a_crash() {
        // A bowtie: the classic self-intersection.
        let raw = "[[112.0, -3.0], [114.0, -1.0], [114.0, -3.0], [112.0, -1.0], [112.0, -3.0]]";
        let area = parse_license_geometry(raw);
        if let Some(area) = area {
            // Repaired to a valid, non-empty geometry.
            assert!(area.unsigned_area() > 0.0);
            let far_away = project_point(Some(40.0), Some(10.0)).unwrap();
            assert!(!area_contains(&area, &far_away));
        }
        // None is also acceptable: an explicit "no geometry".
    }

    #[test]
    fn malformed_entries_are_skipped_not_fatal() {
        assert!(parse_license_geometry("not json at all").is_none());
        assert!(parse_license_geometry("{\"type\": \"Point\", \"coordinates\": [1, 2]}").is_none());
        assert!(parse_license_geometry("[]").is_none());
        assert!(parse_license_geometry("[[112.0, -3.0], [113.0, -3.0]]").is_none());
        assert!(parse_license_geometry("[[\"x\", \"y\"], [1, 2], [3, 4]]").is_none());
    }

    #[test]
    fn containment_is_consistent_through_reprojection() {
        // The same WGS84 point and polygon, both run through the standard
        // projection pipeline, must agree with the geographic-space truth.
        let area = parse_license_geometry(enclosing_square()).unwrap();
        for (lat, lon, expect) in [
            (-2.5, 113.0, true),
            (-1.6, 113.9, true),
            (-2.5, 118.0, false), // 5 degrees east of the block
            (2.5, 113.0, false),
        ] {
            let point = project_point(Some(lat), Some(lon)).unwrap();
            assert_eq!(
                area_contains(&area, &point),
                expect,
                "containment mismatch at ({}, {})",
                lat,
                lon
            );
        }
    }
}
