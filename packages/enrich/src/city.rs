//! City name assignment for ZIP areas.
//!
//! A ZIP polygon can straddle several localities; the locality with the
//! largest overlap area wins, with ties broken by name, so reruns always
//! assign the same city.

use charge_map_geography_models::{AdminDivision, AdminSubtype};
use charge_map_spatial::AreaIndex;
use geo::MultiPolygon;

/// Resolves ZIP polygons to the locality they (mostly) fall inside.
pub struct CityResolver {
    localities: AreaIndex,
}

impl CityResolver {
    /// Builds the resolver from the admin layer, keeping only `Locality`
    /// divisions.
    #[must_use]
    pub fn new(divisions: &[AdminDivision]) -> Self {
        let localities = AreaIndex::build(
            divisions
                .iter()
                .filter(|division| division.subtype == AdminSubtype::Locality)
                .map(|division| (division.name.clone(), division.geometry.clone()))
                .collect(),
        );

        log::info!("City resolver covers {} localities", localities.len());
        Self { localities }
    }

    /// The name of the locality with the largest overlap, or `None` when
    /// the ZIP lies outside every modeled locality (an ordinary outcome,
    /// not an error).
    #[must_use]
    pub fn resolve(&self, zip_geometry: &MultiPolygon<f64>) -> Option<String> {
        self.localities
            .overlaps(zip_geometry)
            .first()
            .map(|overlap| overlap.id.to_string())
    }
}
