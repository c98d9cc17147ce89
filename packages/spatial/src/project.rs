//! Spherical Web Mercator (EPSG:3857) projection for area computation.
//!
//! WGS84 degrees are not a meters-based system, so polygon areas are
//! computed by projecting into Web Mercator and taking the planar area.
//! Latitudes are clamped to the Mercator domain before projecting.

use geo::{Area, Coord, MapCoords, MultiPolygon, coord};

/// Web Mercator sphere radius in meters.
const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Web Mercator is undefined at the poles; inputs are clamped to the
/// conventional cutoff.
const MAX_LATITUDE_DEG: f64 = 85.06;

/// Projects a WGS84 longitude/latitude coordinate into Web Mercator meters.
fn to_mercator(c: Coord<f64>) -> Coord<f64> {
    let lat = c.y.clamp(-MAX_LATITUDE_DEG, MAX_LATITUDE_DEG);
    coord! {
        x: EARTH_RADIUS_M * c.x.to_radians(),
        y: EARTH_RADIUS_M * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln(),
    }
}

/// Area of a WGS84 polygon in square kilometers, via Web Mercator.
///
/// Returns 0 for an empty geometry; callers that need to distinguish
/// empty geometry from a genuinely tiny polygon check emptiness first.
#[must_use]
pub fn mercator_area_km2(mp: &MultiPolygon<f64>) -> f64 {
    let projected = mp.map_coords(to_mercator);
    projected.unsigned_area() / 1.0e6
}
