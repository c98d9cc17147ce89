#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geospatial enrichment pipeline.
//!
//! A batch, run-to-completion sequence of transformations: count chargers
//! into polygon layers, merge demographic attributes, derive per-area
//! scores, and tag ZIP areas with locality names. Three granularities are
//! produced per run:
//!
//! - **Tract stage**: chargers counted per census tract, plus population
//!   and equity scores.
//! - **Admin stage**: tract demographics and counts rolled up into
//!   administrative divisions, plus the same two scores.
//! - **ZIP stage**: the primary artifact, carrying charger counts, access
//!   ratios, the combined underserved score, and an assigned city per ZIP.
//!
//! Each stage fully materializes its output before the next begins; a
//! loader or join failure aborts the run without publishing anything.

pub mod city;
pub mod merge;
pub mod output;
pub mod score;

use std::collections::BTreeMap;
use std::path::Path;

use charge_map_geography_models::{
    AdminDivision, ChargerPoi, EnrichedZip, ScoredAdmin, ScoredTract, Tract, ZipArea,
};
use charge_map_layers::LayersError;
use charge_map_spatial::{AreaIndex, JoinPredicate};
use geo::Point;

use thiserror::Error;

/// Errors that can occur during enrichment.
#[derive(Debug, Error)]
pub enum EnrichError {
    /// A source layer failed to load.
    #[error("Layer error: {0}")]
    Layers(#[from] LayersError),

    /// A polygon's geometry is null/empty, so its area cannot be computed.
    #[error("Invalid geometry for area '{id}'")]
    InvalidGeometry {
        /// Identifier of the offending record.
        id: String,
    },

    /// Artifact write failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Counts chargers per polygon under the `within` predicate.
///
/// Every polygon in `areas` appears in the result, zero-filled when no
/// charger matched.
#[must_use]
pub fn count_chargers(
    areas: Vec<(String, geo::MultiPolygon<f64>)>,
    chargers: &[ChargerPoi],
) -> BTreeMap<String, u64> {
    let index = AreaIndex::build(areas);
    let points: Vec<Point<f64>> = chargers.iter().map(|poi| poi.point).collect();
    index.count_points(&points, JoinPredicate::Within)
}

/// Tract stage: charger counts plus population and equity scores per tract.
#[must_use]
pub fn score_tracts(tracts: Vec<Tract>, chargers: &[ChargerPoi]) -> Vec<ScoredTract> {
    let counts = count_chargers(
        tracts
            .iter()
            .map(|tract| (tract.geoid.clone(), tract.geometry.clone()))
            .collect(),
        chargers,
    );

    tracts
        .into_iter()
        .map(|tract| {
            let ev_poi_count = merge::merged_count(&counts, &tract.geoid);
            ScoredTract {
                population_score: score::population_score(ev_poi_count, tract.population),
                equity_score: score::equity_score(tract.median_income, ev_poi_count),
                geoid: tract.geoid,
                population: tract.population,
                median_income: tract.median_income,
                ev_poi_count,
                geometry: tract.geometry,
            }
        })
        .collect()
}

/// Admin stage: tract demographics and charger counts rolled up into
/// administrative divisions (cities, counties, municipalities, places).
///
/// Divisions are keyed by name and subtype, matching how the demographic
/// rollup groups; a tract intersecting several divisions contributes to
/// each of them.
#[must_use]
pub fn score_admin_divisions(
    tracts: &[Tract],
    divisions: Vec<AdminDivision>,
    chargers: &[ChargerPoi],
) -> Vec<ScoredAdmin> {
    let tract_counts = count_chargers(
        tracts
            .iter()
            .map(|tract| (tract.geoid.clone(), tract.geometry.clone()))
            .collect(),
        chargers,
    );

    let targets: Vec<AdminDivision> = divisions
        .into_iter()
        .filter(|division| division.subtype.is_aggregation_target())
        .collect();

    let division_index = AreaIndex::build(
        targets
            .iter()
            .map(|division| {
                (
                    admin_key(&division.name, division.subtype),
                    division.geometry.clone(),
                )
            })
            .collect(),
    );

    let mut aggregates: BTreeMap<String, merge::AdminAggregate> = BTreeMap::new();
    for tract in tracts {
        let ev_poi_count = merge::merged_count(&tract_counts, &tract.geoid);
        for key in division_index.intersecting(&tract.geometry) {
            aggregates.entry(key.to_string()).or_default().add_tract(
                tract.population,
                tract.median_income,
                ev_poi_count,
            );
        }
    }

    targets
        .into_iter()
        .map(|division| {
            let aggregate = aggregates
                .get(&admin_key(&division.name, division.subtype))
                .copied()
                .unwrap_or_default();
            let average_income = score::round2(aggregate.average_income());

            ScoredAdmin {
                population_score: score::population_score(
                    aggregate.ev_poi_count,
                    aggregate.total_population,
                ),
                equity_score: score::equity_score(average_income, aggregate.ev_poi_count),
                name: division.name,
                subtype: division.subtype,
                total_population: aggregate.total_population,
                average_income,
                ev_poi_count: aggregate.ev_poi_count,
                geometry: division.geometry,
            }
        })
        .collect()
}

/// ZIP stage: merge ACS populations, count chargers, derive access ratios
/// and the underserved score, and assign a city per ZIP.
///
/// # Errors
///
/// Returns [`EnrichError::InvalidGeometry`] if a ZIP polygon is empty.
pub fn enrich_zips(
    zips: Vec<ZipArea>,
    populations: &BTreeMap<String, u64>,
    chargers: &[ChargerPoi],
    divisions: &[AdminDivision],
) -> Result<Vec<EnrichedZip>, EnrichError> {
    let counts = count_chargers(
        zips.iter()
            .map(|zip| (zip.zip.clone(), zip.geometry.clone()))
            .collect(),
        chargers,
    );
    let resolver = city::CityResolver::new(divisions);

    zips.into_iter()
        .map(|area| {
            let population = populations
                .get(&area.zip)
                .copied()
                .unwrap_or(area.population);
            let ev_poi_count = merge::merged_count(&counts, &area.zip);
            let city = resolver.resolve(&area.geometry);

            let mut record = score::score_zip(area.zip, population, ev_poi_count, area.geometry)?;
            record.city = city;
            Ok(record)
        })
        .collect()
}

/// Runs the tract stage end to end: load, join, score, write.
///
/// # Errors
///
/// Returns [`EnrichError`] if a source layer is unavailable or the artifact
/// cannot be written.
pub fn run_tract_stage(
    tracts_path: &Path,
    chargers_path: &Path,
    output_path: &Path,
) -> Result<(), EnrichError> {
    let tracts = charge_map_layers::load_tracts(tracts_path)?;
    let chargers = charge_map_layers::load_charger_pois(chargers_path)?;

    log::info!("Joining {} chargers to {} tracts...", chargers.len(), tracts.len());
    let scored = score_tracts(tracts, &chargers);

    output::write_tract_scores(output_path, &scored)
}

/// Runs the admin stage end to end: load, join, aggregate, score, write.
///
/// # Errors
///
/// Returns [`EnrichError`] if a source layer is unavailable or the artifact
/// cannot be written.
pub fn run_admin_stage(
    tracts_path: &Path,
    admin_path: &Path,
    chargers_path: &Path,
    output_path: &Path,
) -> Result<(), EnrichError> {
    let tracts = charge_map_layers::load_tracts(tracts_path)?;
    let divisions = charge_map_layers::load_admin_divisions(admin_path)?;
    let chargers = charge_map_layers::load_charger_pois(chargers_path)?;

    log::info!(
        "Aggregating {} tracts into {} admin divisions...",
        tracts.len(),
        divisions.len()
    );
    let scored = score_admin_divisions(&tracts, divisions, &chargers);

    output::write_admin_scores(output_path, &scored)
}

/// Runs the ZIP stage end to end: load, merge, join, score, enrich, write.
///
/// Writes both the enriched `GeoJSON` table and the ranking CSV.
///
/// # Errors
///
/// Returns [`EnrichError`] if a source layer is unavailable, a ZIP polygon
/// is degenerate, or an artifact cannot be written.
pub fn run_zip_stage(
    zips_path: &Path,
    population_path: &Path,
    chargers_path: &Path,
    admin_path: &Path,
    output_path: &Path,
    ranking_csv_path: &Path,
) -> Result<(), EnrichError> {
    let zips = charge_map_layers::load_zip_areas(zips_path)?;
    let populations = charge_map_layers::load_zip_population(population_path)?;
    let chargers = charge_map_layers::load_charger_pois(chargers_path)?;
    let divisions = charge_map_layers::load_admin_divisions(admin_path)?;

    log::info!("Enriching {} ZIP areas...", zips.len());
    let enriched = enrich_zips(zips, &populations, &chargers, &divisions)?;

    output::write_enriched_zips(output_path, &enriched)?;
    output::write_zip_ranking_csv(ranking_csv_path, &enriched)
}

fn admin_key(name: &str, subtype: charge_map_geography_models::AdminSubtype) -> String {
    format!("{subtype}/{name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use charge_map_geography_models::AdminSubtype;
    use geo::{MultiPolygon, polygon};

    fn square(min_x: f64, min_y: f64, size: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: min_x, y: min_y),
            (x: min_x + size, y: min_y),
            (x: min_x + size, y: min_y + size),
            (x: min_x, y: min_y + size),
            (x: min_x, y: min_y),
        ]])
    }

    fn charger(x: f64, y: f64) -> ChargerPoi {
        ChargerPoi {
            category: "charging_station".to_string(),
            point: geo::Point::new(x, y),
        }
    }

    fn tract(geoid: &str, population: u64, income: f64, geometry: MultiPolygon<f64>) -> Tract {
        Tract {
            geoid: geoid.to_string(),
            population,
            median_income: income,
            geometry,
        }
    }

    #[test]
    fn tract_stage_counts_and_scores() {
        let tracts = vec![
            tract("t1", 4_000, 55_000.0, square(0.0, 0.0, 1.0)),
            tract("t2", 0, 0.0, square(2.0, 0.0, 1.0)),
        ];
        let chargers = vec![charger(0.5, 0.5), charger(0.25, 0.25)];

        let scored = score_tracts(tracts, &chargers);

        assert_eq!(scored[0].ev_poi_count, 2);
        assert_eq!(scored[1].ev_poi_count, 0, "Zero-count tract must be kept");
        assert!(scored[1].population_score.is_finite());
        assert!(scored[1].equity_score.is_finite());
    }

    #[test]
    fn admin_stage_rolls_up_member_tracts() {
        let tracts = vec![
            tract("t1", 1_000, 40_000.0, square(0.0, 0.0, 1.0)),
            tract("t2", 3_000, 60_000.0, square(1.0, 0.0, 1.0)),
            // Far away; belongs to no division.
            tract("t3", 9_000, 90_000.0, square(50.0, 50.0, 1.0)),
        ];
        let divisions = vec![
            AdminDivision {
                name: "Austin".to_string(),
                subtype: AdminSubtype::City,
                geometry: square(0.0, 0.0, 2.0),
            },
            AdminDivision {
                name: "Downtown".to_string(),
                subtype: AdminSubtype::Locality,
                geometry: square(0.0, 0.0, 2.0),
            },
        ];
        let chargers = vec![charger(0.5, 0.5)];

        let scored = score_admin_divisions(&tracts, divisions, &chargers);

        // Localities are not aggregation targets.
        assert_eq!(scored.len(), 1);
        let austin = &scored[0];
        assert_eq!(austin.name, "Austin");
        assert_eq!(austin.total_population, 4_000);
        assert_eq!(austin.ev_poi_count, 1);
        assert!((austin.average_income - 50_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn admin_division_with_no_tracts_is_kept_with_zeros() {
        let tracts = vec![tract("t1", 1_000, 40_000.0, square(0.0, 0.0, 1.0))];
        let divisions = vec![AdminDivision {
            name: "Elsewhere".to_string(),
            subtype: AdminSubtype::County,
            geometry: square(80.0, 80.0, 2.0),
        }];

        let scored = score_admin_divisions(&tracts, divisions, &[]);

        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].total_population, 0);
        assert_eq!(scored[0].ev_poi_count, 0);
        assert!(scored[0].population_score.is_finite());
    }

    #[test]
    fn zip_stage_merges_population_and_assigns_city() {
        let zips = vec![
            ZipArea {
                zip: "78701".to_string(),
                population: 0,
                geometry: square(0.0, 0.0, 1.0),
            },
            ZipArea {
                zip: "78799".to_string(),
                population: 0,
                geometry: square(30.0, 30.0, 1.0),
            },
        ];
        let populations = BTreeMap::from([("78701".to_string(), 25_000_u64)]);
        let chargers = vec![charger(0.5, 0.5)];
        let divisions = vec![AdminDivision {
            name: "Austin".to_string(),
            subtype: AdminSubtype::Locality,
            geometry: square(-1.0, -1.0, 3.0),
        }];

        let enriched = enrich_zips(zips, &populations, &chargers, &divisions).unwrap();

        let downtown = &enriched[0];
        assert_eq!(downtown.population, 25_000);
        assert_eq!(downtown.ev_poi_count, 1);
        assert_eq!(downtown.city.as_deref(), Some("Austin"));
        assert!(downtown.underserved_score.is_finite());

        let remote = &enriched[1];
        assert_eq!(remote.population, 0, "Unmatched ZIP population fills 0");
        assert_eq!(remote.ev_poi_count, 0);
        assert_eq!(remote.city, None);
    }

    #[test]
    fn less_access_means_higher_underserved_score() {
        let zips = vec![
            ZipArea {
                zip: "1".to_string(),
                population: 10_000,
                geometry: square(0.0, 0.0, 1.0),
            },
            ZipArea {
                zip: "2".to_string(),
                population: 10_000,
                geometry: square(10.0, 0.0, 1.0),
            },
        ];
        // Same population and area; ZIP 2 has more chargers.
        let chargers = vec![
            charger(0.5, 0.5),
            charger(10.5, 0.5),
            charger(10.25, 0.25),
            charger(10.75, 0.75),
        ];

        let enriched = enrich_zips(zips, &BTreeMap::new(), &chargers, &[]).unwrap();

        assert!(enriched[0].underserved_score > enriched[1].underserved_score);
    }

    #[test]
    fn rerunning_the_zip_stage_is_idempotent() {
        let make_inputs = || {
            (
                vec![ZipArea {
                    zip: "78701".to_string(),
                    population: 25_000,
                    geometry: square(0.0, 0.0, 1.0),
                }],
                vec![charger(0.5, 0.5)],
            )
        };

        let (zips_a, chargers_a) = make_inputs();
        let (zips_b, chargers_b) = make_inputs();

        let first = enrich_zips(zips_a, &BTreeMap::new(), &chargers_a, &[]).unwrap();
        let second = enrich_zips(zips_b, &BTreeMap::new(), &chargers_b, &[]).unwrap();

        assert_eq!(first, second);
    }
}
