#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Read-only query layer over the enriched ZIP table.
//!
//! [`AccessTable`] is an owned data-access object: construct it once at
//! process start (or from fixture features in tests) and hand references
//! to callers. The table is immutable after load, so concurrent readers
//! share it without locking. Each public method corresponds to a tool the
//! serving layer and the LLM agent expose.
//!
//! A load failure ([`AnalyticsError`]) is distinct from an empty query
//! result ([`QueryOutcome::NotFound`]): the first means no data is
//! available at all, the second is an ordinary answer.

use std::collections::BTreeSet;
use std::path::Path;

use charge_map_analytics_models::{POPULATION_FLOOR, QueryOutcome, ZipDetail, ZipRanking};
use charge_map_layers::LayersError;
use geojson::{Feature, FeatureCollection};
use thiserror::Error;

/// Errors that can occur while loading the enriched table.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// The enriched ZIP artifact is missing, unreadable, or corrupt.
    #[error("Data unavailable: {0}")]
    DataUnavailable(#[from] LayersError),

    /// The artifact parsed but contained no usable ZIP records; serving
    /// queries from it would silently answer "not found" to everything.
    #[error("Enriched table contains no ZIP records")]
    EmptyTable,
}

struct ZipRow {
    detail: ZipDetail,
    feature: Feature,
}

/// The loaded enriched ZIP table.
pub struct AccessTable {
    rows: Vec<ZipRow>,
}

impl AccessTable {
    /// Loads the table from the enriched `GeoJSON` artifact.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError`] if the artifact cannot be read or holds
    /// no usable records.
    pub fn load(path: &Path) -> Result<Self, AnalyticsError> {
        let collection = charge_map_layers::read_feature_collection(path)?;
        let table = Self::from_features(collection.features)?;
        log::info!(
            "Loaded enriched table from {} ({} ZIPs)",
            path.display(),
            table.len()
        );
        Ok(table)
    }

    /// Builds the table from already-parsed features. Fixture entry point
    /// for tests and embedded callers.
    ///
    /// Features without a `ZIP` property are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::EmptyTable`] if no feature yields a row.
    pub fn from_features(features: Vec<Feature>) -> Result<Self, AnalyticsError> {
        let rows: Vec<ZipRow> = features
            .into_iter()
            .filter_map(|feature| {
                let Some(zip) = charge_map_layers::string_prop(&feature, "ZIP") else {
                    log::warn!("Skipping enriched record without a ZIP property");
                    return None;
                };
                let detail = ZipDetail {
                    city: charge_map_layers::string_prop(&feature, "city"),
                    population: charge_map_layers::u64_prop(&feature, "population"),
                    ev_poi_count: charge_map_layers::u64_prop(&feature, "ev_poi_count"),
                    evs_per_capita: charge_map_layers::f64_prop(&feature, "evs_per_capita"),
                    area_km2: charge_map_layers::f64_prop(&feature, "area_km2"),
                    evs_per_km2: charge_map_layers::f64_prop(&feature, "evs_per_km2"),
                    underserved_score: charge_map_layers::f64_prop(&feature, "underserved_score"),
                    zip,
                };
                Some(ZipRow { detail, feature })
            })
            .collect();

        if rows.is_empty() {
            return Err(AnalyticsError::EmptyTable);
        }

        Ok(Self { rows })
    }

    /// Number of ZIP records in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table is empty. Always false for a constructed table.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct city names, case-insensitively de-duplicated (first-seen
    /// casing wins) and sorted.
    #[must_use]
    pub fn list_areas(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut areas = Vec::new();

        for row in &self.rows {
            if let Some(city) = &row.detail.city
                && seen.insert(city.to_lowercase())
            {
                areas.push(city.clone());
            }
        }

        areas.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)));
        areas
    }

    /// ZIPs of `area` above the population floor, most underserved first
    /// (ascending chargers per capita, ties by ZIP), truncated to `top_n`.
    ///
    /// Both "unknown city" and "no ZIP passes the population filter" are
    /// [`QueryOutcome::NotFound`]: expected outcomes, not failures.
    #[must_use]
    pub fn rank_underserved(
        &self,
        area: &str,
        population_floor: u64,
        top_n: usize,
    ) -> QueryOutcome<Vec<ZipRanking>> {
        let in_city: Vec<&ZipRow> = self.rows_for_area(area).collect();
        if in_city.is_empty() {
            return QueryOutcome::NotFound {
                message: format!("No ZIPs found for city: {}", area.trim()),
            };
        }

        let mut eligible: Vec<&ZipRow> = in_city
            .into_iter()
            .filter(|row| row.detail.population > population_floor)
            .collect();
        if eligible.is_empty() {
            return QueryOutcome::NotFound {
                message: format!(
                    "No ZIPs found for city: {} with population > {population_floor}",
                    area.trim()
                ),
            };
        }

        eligible.sort_by(|a, b| {
            a.detail
                .evs_per_capita
                .total_cmp(&b.detail.evs_per_capita)
                .then_with(|| a.detail.zip.cmp(&b.detail.zip))
        });

        QueryOutcome::Found(
            eligible
                .into_iter()
                .take(top_n)
                .map(|row| ZipRanking {
                    zip: row.detail.zip.clone(),
                    population: row.detail.population,
                    ev_poi_count: row.detail.ev_poi_count,
                    evs_per_capita: row.detail.evs_per_capita,
                })
                .collect(),
        )
    }

    /// Geometry and attributes for every ZIP of `area`, as a feature
    /// collection for map display.
    ///
    /// An empty match is [`QueryOutcome::NotFound`], never an
    /// empty-but-valid collection.
    #[must_use]
    pub fn area_boundaries(&self, area: &str) -> QueryOutcome<FeatureCollection> {
        let features: Vec<Feature> = self
            .rows_for_area(area)
            .map(|row| row.feature.clone())
            .collect();

        if features.is_empty() {
            return QueryOutcome::NotFound {
                message: format!("No ZIPs found for city: {}", area.trim()),
            };
        }

        QueryOutcome::Found(FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        })
    }

    /// Full statistics for one ZIP.
    ///
    /// A ZIP that exists but sits at or below the population floor is
    /// [`QueryOutcome::Excluded`], distinguished from
    /// [`QueryOutcome::NotFound`]. The exclusion is a business rule, not a
    /// data-quality failure.
    #[must_use]
    pub fn area_detail(&self, zip: &str) -> QueryOutcome<ZipDetail> {
        let zip = zip.trim();
        let Some(row) = self.rows.iter().find(|row| row.detail.zip == zip) else {
            return QueryOutcome::NotFound {
                message: format!("No data found for ZIP code: {zip}"),
            };
        };

        if row.detail.population <= POPULATION_FLOOR {
            return QueryOutcome::Excluded {
                message: format!(
                    "ZIP code {zip} has population <= {POPULATION_FLOOR} and is excluded from analysis"
                ),
            };
        }

        QueryOutcome::Found(row.detail.clone())
    }

    fn rows_for_area<'a>(&'a self, area: &str) -> impl Iterator<Item = &'a ZipRow> {
        let needle = area.trim().to_lowercase();
        self.rows.iter().filter(move |row| {
            row.detail
                .city
                .as_ref()
                .is_some_and(|city| city.to_lowercase() == needle)
        })
    }
}
