#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Query outcome and result types for the EV access query layer.
//!
//! These types are the contract between the query layer and its callers
//! (the HTTP surface and the LLM agent's tools). "No result" conditions
//! are ordinary values with a distinguishing kind, never exceptions, so
//! callers branch on the kind instead of parsing message text.

use serde::{Deserialize, Serialize};

/// Minimum population for a ZIP to participate in ranking and detail
/// queries. A business rule enforced by the core so results are correct
/// regardless of the caller.
pub const POPULATION_FLOOR: u64 = 10_000;

/// Default number of ranked ZIPs returned when the caller does not ask
/// for a specific count.
pub const DEFAULT_RANK_LIMIT: usize = 5;

/// Outcome of a read-only query.
///
/// `NotFound` and `Excluded` are normal, expected outcomes (a query over
/// an area nobody modeled, or a record below the population floor) and
/// must be rendered as user-facing messages by the serving layer, never
/// as errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum QueryOutcome<T> {
    /// The query matched; the payload is the result.
    Found(T),
    /// No record matched the query.
    NotFound {
        /// Human-readable description of what was looked up.
        message: String,
    },
    /// A record matched but is excluded by the population-floor business
    /// rule. Distinguished from [`QueryOutcome::NotFound`] so callers can
    /// explain *why* nothing came back.
    Excluded {
        /// Human-readable description of the exclusion.
        message: String,
    },
}

impl<T> QueryOutcome<T> {
    /// The payload, if the query matched.
    #[must_use]
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::NotFound { .. } | Self::Excluded { .. } => None,
        }
    }

    /// Whether the query matched.
    #[must_use]
    pub const fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// One ranked ZIP in an underserved-areas query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZipRanking {
    /// Five-digit ZIP code.
    pub zip: String,
    /// ZIP population.
    pub population: u64,
    /// Chargers located within the ZIP.
    pub ev_poi_count: u64,
    /// Chargers per resident; the ranking key (ascending).
    pub evs_per_capita: f64,
}

/// Full statistics for a single ZIP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZipDetail {
    /// Five-digit ZIP code.
    pub zip: String,
    /// Assigned city, when a locality matched during enrichment.
    pub city: Option<String>,
    /// ZIP population.
    pub population: u64,
    /// Chargers located within the ZIP.
    pub ev_poi_count: u64,
    /// Chargers per resident.
    pub evs_per_capita: f64,
    /// Land area in square kilometers.
    pub area_km2: f64,
    /// Chargers per square kilometer.
    pub evs_per_km2: f64,
    /// Composite underserved score; higher means worse access.
    pub underserved_score: f64,
}
