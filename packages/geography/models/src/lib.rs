#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geographic area and charging point-of-interest types.
//!
//! These types represent the polygon layers (census tracts, ZIP code areas,
//! administrative divisions) and the EV charger point layer that flow through
//! the enrichment pipeline, plus the scored variants the pipeline produces.
//! All geometry is WGS84 longitude/latitude.

use geo::{MultiPolygon, Point};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Subtype of an administrative division, as tagged in the admin boundary
/// layer.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AdminSubtype {
    /// Incorporated city.
    City,
    /// County.
    County,
    /// Municipality.
    Municipality,
    /// Census-designated place.
    Place,
    /// Named locality; the layer used to assign city names to ZIP areas.
    Locality,
}

impl AdminSubtype {
    /// Subtypes that participate in admin-level aggregation.
    ///
    /// Localities are excluded here; they are only used as a city-name
    /// source for ZIP enrichment.
    pub const AGGREGATION: &[Self] = &[Self::City, Self::County, Self::Municipality, Self::Place];

    /// Whether this subtype is an aggregation target.
    #[must_use]
    pub fn is_aggregation_target(self) -> bool {
        Self::AGGREGATION.contains(&self)
    }
}

/// A census tract with demographic attributes.
///
/// Tracts are the finest-grained scoring layer and also feed the admin-level
/// aggregation (tract demographics roll up into division totals).
#[derive(Debug, Clone, PartialEq)]
pub struct Tract {
    /// Census GEOID (state FIPS + county FIPS + tract code, e.g. "48453001100").
    pub geoid: String,
    /// Population from ACS estimates; 0 when the estimate is missing.
    pub population: u64,
    /// Median household income; 0 when the estimate is missing.
    pub median_income: f64,
    /// Tract boundary.
    pub geometry: MultiPolygon<f64>,
}

/// A ZIP code area (ZCTA polygon).
#[derive(Debug, Clone, PartialEq)]
pub struct ZipArea {
    /// Five-digit ZIP code.
    pub zip: String,
    /// Population from ACS estimates; 0 when no estimate matched.
    pub population: u64,
    /// ZIP boundary.
    pub geometry: MultiPolygon<f64>,
}

/// A named administrative division polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminDivision {
    /// Division name (e.g. "Austin", "Travis County").
    pub name: String,
    /// Division subtype.
    pub subtype: AdminSubtype,
    /// Division boundary.
    pub geometry: MultiPolygon<f64>,
}

/// An EV charging station location.
///
/// Chargers are only ever counted into polygons; they are never persisted
/// downstream beyond their count contribution.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargerPoi {
    /// Amenity/category tag from the source POI layer.
    pub category: String,
    /// Charger location.
    pub point: Point<f64>,
}

/// A census tract with charger counts and derived scores.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTract {
    /// Census GEOID.
    pub geoid: String,
    /// Tract population.
    pub population: u64,
    /// Median household income.
    pub median_income: f64,
    /// Chargers located within the tract.
    pub ev_poi_count: u64,
    /// Access-per-capita proxy; add-one smoothed, rounded to 4 decimals.
    pub population_score: f64,
    /// Income-to-access ratio; higher means less equitable access.
    pub equity_score: f64,
    /// Tract boundary.
    pub geometry: MultiPolygon<f64>,
}

/// An administrative division with aggregated tract demographics, charger
/// counts, and derived scores.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredAdmin {
    /// Division name.
    pub name: String,
    /// Division subtype.
    pub subtype: AdminSubtype,
    /// Sum of member tract populations.
    pub total_population: u64,
    /// Mean of member tract median incomes, rounded to 2 decimals.
    pub average_income: f64,
    /// Sum of member tract charger counts.
    pub ev_poi_count: u64,
    /// Access-per-capita proxy; add-one smoothed, rounded to 4 decimals.
    pub population_score: f64,
    /// Income-to-access ratio; higher means less equitable access.
    pub equity_score: f64,
    /// Division boundary.
    pub geometry: MultiPolygon<f64>,
}

/// The fully enriched ZIP record: charger counts, access ratios, the
/// combined underserved score, and the assigned city name.
///
/// This is the shape of the persisted enriched table that the query layer
/// and all downstream consumers read.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedZip {
    /// Five-digit ZIP code.
    pub zip: String,
    /// ZIP population.
    pub population: u64,
    /// Chargers located within the ZIP.
    pub ev_poi_count: u64,
    /// Chargers per resident, add-one smoothed.
    pub evs_per_capita: f64,
    /// Land area in square kilometers (Web Mercator projection).
    pub area_km2: f64,
    /// Chargers per square kilometer, add-one smoothed.
    pub evs_per_km2: f64,
    /// Composite score; higher means worse charging access relative to
    /// population and area.
    pub underserved_score: f64,
    /// Name of the locality the ZIP falls inside, when one matched.
    pub city: Option<String>,
    /// ZIP boundary.
    pub geometry: MultiPolygon<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_subtype_round_trips_through_strings() {
        for subtype in [
            AdminSubtype::City,
            AdminSubtype::County,
            AdminSubtype::Municipality,
            AdminSubtype::Place,
            AdminSubtype::Locality,
        ] {
            let s = subtype.to_string();
            let parsed: AdminSubtype = s.parse().unwrap_or_else(|_| {
                panic!("Failed to parse subtype back from '{s}'");
            });
            assert_eq!(parsed, subtype);
        }
    }

    #[test]
    fn locality_is_not_an_aggregation_target() {
        assert!(!AdminSubtype::Locality.is_aggregation_target());
        assert!(AdminSubtype::City.is_aggregation_target());
        assert!(AdminSubtype::County.is_aggregation_target());
    }
}
