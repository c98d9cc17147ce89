//! Derived score computation for polygon areas.
//!
//! All denominators are floored or add-one smoothed before division, so
//! every score is finite for zero-population, zero-income, and zero-count
//! inputs. Results are rounded to 4 decimal places so reruns produce
//! identical artifacts and sort order is stable under floating-point noise.

use charge_map_geography_models::EnrichedZip;
use geo::MultiPolygon;

use crate::EnrichError;

/// Smoothing term that bounds the underserved score as access approaches
/// zero while keeping it finite and strictly decreasing as access grows.
pub const SCORE_EPSILON: f64 = 0.001;

/// Rounds to 4 decimal places.
#[must_use]
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Rounds to 2 decimal places.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Access-per-capita proxy: `(ev_poi_count + 1) / (max(population, 1) + 1)`.
///
/// Lower means more underserved.
#[must_use]
pub fn population_score(ev_poi_count: u64, population: u64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let score = (ev_poi_count as f64 + 1.0) / (population.max(1) as f64 + 1.0);
    round4(score)
}

/// Income-to-access ratio: `(income + 1) / (ev_poi_count + 1)`.
///
/// Higher means income is high relative to access, so affluent but
/// underserved areas float up.
#[must_use]
pub fn equity_score(income: f64, ev_poi_count: u64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let score = (income + 1.0) / (ev_poi_count as f64 + 1.0);
    round4(score)
}

/// Chargers per resident: `ev_poi_count / (population + 1)`.
#[must_use]
pub fn evs_per_capita(ev_poi_count: u64, population: u64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let ratio = ev_poi_count as f64 / (population as f64 + 1.0);
    round4(ratio)
}

/// Chargers per square kilometer: `ev_poi_count / (area_km2 + 1)`.
#[must_use]
pub fn evs_per_km2(ev_poi_count: u64, area_km2: f64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let ratio = ev_poi_count as f64 / (area_km2 + 1.0);
    round4(ratio)
}

/// Composite underserved score:
/// `1/(evs_per_capita + ε) + 1/(evs_per_km2 + ε)` with ε = 0.001.
///
/// Strictly decreasing in each access ratio: lower access always produces
/// a higher score.
#[must_use]
pub fn underserved_score(evs_per_capita: f64, evs_per_km2: f64) -> f64 {
    round4(1.0 / (evs_per_capita + SCORE_EPSILON) + 1.0 / (evs_per_km2 + SCORE_EPSILON))
}

/// Area of a polygon in square kilometers.
///
/// # Errors
///
/// Returns [`EnrichError::InvalidGeometry`] for a null/empty geometry,
/// since no area can be computed and a score derived from it would be
/// meaningless.
pub fn area_km2(id: &str, geometry: &MultiPolygon<f64>) -> Result<f64, EnrichError> {
    if geometry.0.is_empty() {
        return Err(EnrichError::InvalidGeometry { id: id.to_string() });
    }
    Ok(round4(charge_map_spatial::project::mercator_area_km2(
        geometry,
    )))
}

/// Computes the full set of derived ZIP attributes from counted chargers,
/// merged population, and geometry.
///
/// # Errors
///
/// Returns [`EnrichError::InvalidGeometry`] if the ZIP polygon is empty.
pub fn score_zip(
    zip: String,
    population: u64,
    ev_poi_count: u64,
    geometry: MultiPolygon<f64>,
) -> Result<EnrichedZip, EnrichError> {
    let area = area_km2(&zip, &geometry)?;
    let per_capita = evs_per_capita(ev_poi_count, population);
    let per_km2 = evs_per_km2(ev_poi_count, area);

    Ok(EnrichedZip {
        zip,
        population,
        ev_poi_count,
        evs_per_capita: per_capita,
        area_km2: area,
        evs_per_km2: per_km2,
        underserved_score: underserved_score(per_capita, per_km2),
        city: None,
        geometry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn unit_square() -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 0.01, y: 0.0),
            (x: 0.01, y: 0.01),
            (x: 0.0, y: 0.01),
            (x: 0.0, y: 0.0),
        ]])
    }

    #[test]
    fn scores_are_finite_for_zero_inputs() {
        assert!(population_score(0, 0).is_finite());
        assert!(equity_score(0.0, 0).is_finite());
        assert!(evs_per_capita(0, 0).is_finite());
        assert!(evs_per_km2(0, 0.0).is_finite());
        assert!(underserved_score(0.0, 0.0).is_finite());
    }

    #[test]
    fn population_score_floors_the_denominator() {
        // population 0 and 1 must produce the same smoothed denominator.
        assert!((population_score(3, 0) - population_score(3, 1)).abs() < f64::EPSILON);
        assert!((population_score(3, 0) - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn equity_score_grows_with_income() {
        assert!(equity_score(80_000.0, 2) > equity_score(30_000.0, 2));
    }

    #[test]
    fn underserved_score_decreases_as_access_grows() {
        // Strictly decreasing in evs_per_capita with evs_per_km2 fixed...
        assert!(underserved_score(0.001, 0.5) > underserved_score(0.002, 0.5));
        assert!(underserved_score(0.002, 0.5) > underserved_score(0.01, 0.5));
        // ...and vice versa.
        assert!(underserved_score(0.5, 0.001) > underserved_score(0.5, 0.002));
    }

    #[test]
    fn rounding_is_stable() {
        assert!((round4(0.123_449) - 0.1234).abs() < f64::EPSILON);
        assert!((round4(0.123_46) - 0.1235).abs() < f64::EPSILON);
        assert!((round2(3.141_59) - 3.14).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_geometry_is_invalid() {
        let result = area_km2("78701", &MultiPolygon(vec![]));
        assert!(matches!(
            result,
            Err(EnrichError::InvalidGeometry { ref id }) if id == "78701"
        ));
    }

    #[test]
    fn score_zip_populates_every_derived_field() {
        let zip = score_zip("78701".to_string(), 25_000, 4, unit_square()).unwrap();

        assert_eq!(zip.ev_poi_count, 4);
        assert!(zip.area_km2 > 0.0);
        assert!(zip.evs_per_capita > 0.0);
        assert!(zip.evs_per_km2 > 0.0);
        assert!(zip.underserved_score.is_finite());
        assert!(zip.city.is_none());
    }
}
