// src/geo/projection.rs
//
// Forward projection from geographic WGS84 coordinates to spherical
// ("web") Mercator, so containment and area math happen in consistent
// linear units instead of degrees.

use geo::Point;

/// WGS84 equatorial radius in meters, the sphere radius used by EPSG:3857.
const EARTH_RADIUS: f64 = 6_378_137.0;

/// Latitudes beyond this are not representable in spherical Mercator.
const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

/// Projects a (longitude, latitude) pair in degrees to planar Mercator
/// meters. Deterministic and stateless. Returns `None` for non-finite or
/// out-of-range input rather than erroring.
pub fn project_lon_lat(lon: f64, lat: f64) -> Option<(f64, f64)> {
    if !lon.is_finite() || !lat.is_finite() {
        return None;
    }
    if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
        return None;
    }

    // Clamp toward the poles; Mercator diverges at +/-90.
    let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);

    let x = EARTH_RADIUS * lon.to_radians();
    let y = EARTH_RADIUS * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();

    Some((x, y))
}

/// Builds a projected point from optional latitude/longitude record fields.
/// Missing or invalid coordinates yield "no geometry", never an error.
pub fn project_point(lat: Option<f64>, lon: Option<f64>) -> Option<Point<f64>> {
    let (x, y) = project_lon_lat(lon?, lat?)?;
    Some(Point::new(x, y))
}
