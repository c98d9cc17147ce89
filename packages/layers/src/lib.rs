#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geometry and attribute layer loading.
//!
//! Reads the pipeline's input layers (`GeoJSON` feature collections for
//! polygons and charger points, plus the ACS population CSV) into typed
//! records. Every layer is WGS84 longitude/latitude: `GeoJSON` carries that
//! by specification, and a legacy `crs` member naming anything else is
//! rejected rather than silently mis-joined.
//!
//! A missing or unparseable source is fatal ([`LayersError::DataUnavailable`])
//! and must propagate: scoring an empty layer would produce a plausible but
//! meaningless table. Individual features with empty geometry are skipped
//! with a warning since they cannot participate in spatial joins.

use std::collections::BTreeMap;
use std::path::Path;

use charge_map_geography_models::{AdminDivision, AdminSubtype, ChargerPoi, Tract, ZipArea};
use geo::{MultiPolygon, Point};
use geojson::{Feature, FeatureCollection, GeoJson};
use thiserror::Error;

/// Errors that can occur while loading layers.
#[derive(Debug, Error)]
pub enum LayersError {
    /// Source layer file missing, unreadable, or corrupt. Fatal to the
    /// pipeline run.
    #[error("Source layer unavailable at {path}: {reason}")]
    DataUnavailable {
        /// Path of the source that failed to load.
        path: String,
        /// What went wrong.
        reason: String,
    },
}

impl LayersError {
    fn unavailable(path: &Path, reason: impl std::fmt::Display) -> Self {
        Self::DataUnavailable {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Legacy `crs` member values that still mean WGS84 longitude/latitude.
const WGS84_CRS_NAMES: &[&str] = &[
    "urn:ogc:def:crs:OGC:1.3:CRS84",
    "urn:ogc:def:crs:EPSG::4326",
    "EPSG:4326",
];

/// Loads census tracts with their demographic attributes.
///
/// Expects `GEOID`, `population`, and `median_income` properties; missing
/// demographics default to 0.
///
/// # Errors
///
/// Returns [`LayersError::DataUnavailable`] if the file is missing or does
/// not parse as a WGS84 feature collection.
pub fn load_tracts(path: &Path) -> Result<Vec<Tract>, LayersError> {
    let collection = read_feature_collection(path)?;
    let tracts = collection
        .features
        .iter()
        .filter_map(|feature| {
            let geoid = string_prop(feature, "GEOID")?;
            let geometry = feature_multipolygon(feature, &geoid)?;
            Some(Tract {
                geoid,
                population: u64_prop(feature, "population"),
                median_income: f64_prop(feature, "median_income"),
                geometry,
            })
        })
        .collect::<Vec<_>>();

    log::info!("Loaded {} tracts from {}", tracts.len(), path.display());
    Ok(tracts)
}

/// Loads ZIP code area polygons.
///
/// Expects a `ZIP` property. A `population` property is honored when
/// present, but population normally arrives separately via
/// [`load_zip_population`].
///
/// # Errors
///
/// Returns [`LayersError::DataUnavailable`] if the file is missing or does
/// not parse as a WGS84 feature collection.
pub fn load_zip_areas(path: &Path) -> Result<Vec<ZipArea>, LayersError> {
    let collection = read_feature_collection(path)?;
    let zips = collection
        .features
        .iter()
        .filter_map(|feature| {
            let zip = string_prop(feature, "ZIP")?;
            let geometry = feature_multipolygon(feature, &zip)?;
            Some(ZipArea {
                zip,
                population: u64_prop(feature, "population"),
                geometry,
            })
        })
        .collect::<Vec<_>>();

    log::info!("Loaded {} ZIP areas from {}", zips.len(), path.display());
    Ok(zips)
}

/// Loads administrative division polygons.
///
/// Features with an unrecognized `subtype` are skipped with a warning; the
/// admin layer carries subtypes (districts, regions) the pipeline never
/// aggregates over.
///
/// # Errors
///
/// Returns [`LayersError::DataUnavailable`] if the file is missing or does
/// not parse as a WGS84 feature collection.
pub fn load_admin_divisions(path: &Path) -> Result<Vec<AdminDivision>, LayersError> {
    let collection = read_feature_collection(path)?;
    let divisions = collection
        .features
        .iter()
        .filter_map(|feature| {
            let name = string_prop(feature, "name")?;
            let subtype_raw = string_prop(feature, "subtype")?;
            let Ok(subtype) = subtype_raw.parse::<AdminSubtype>() else {
                log::warn!("Skipping admin division '{name}' with subtype '{subtype_raw}'");
                return None;
            };
            let geometry = feature_multipolygon(feature, &name)?;
            Some(AdminDivision {
                name,
                subtype,
                geometry,
            })
        })
        .collect::<Vec<_>>();

    log::info!(
        "Loaded {} admin divisions from {}",
        divisions.len(),
        path.display()
    );
    Ok(divisions)
}

/// Loads EV charger point locations.
///
/// # Errors
///
/// Returns [`LayersError::DataUnavailable`] if the file is missing or does
/// not parse as a WGS84 feature collection.
pub fn load_charger_pois(path: &Path) -> Result<Vec<ChargerPoi>, LayersError> {
    let collection = read_feature_collection(path)?;
    let pois = collection
        .features
        .iter()
        .filter_map(|feature| {
            let point = feature_point(feature)?;
            let category = string_prop(feature, "category")
                .or_else(|| string_prop(feature, "amenity"))
                .unwrap_or_else(|| "charging_station".to_string());
            Some(ChargerPoi { category, point })
        })
        .collect::<Vec<_>>();

    log::info!("Loaded {} charger POIs from {}", pois.len(), path.display());
    Ok(pois)
}

/// Loads ZIP populations from an ACS B01003 export.
///
/// The census export mixes geography levels in one file: rows whose
/// `GEO_ID` carries the tract prefix `1400000US` are skipped, and the ZIP
/// is the trailing five characters of `GEO_ID`. Unparseable counts default
/// to 0.
///
/// # Errors
///
/// Returns [`LayersError::DataUnavailable`] if the file is missing or the
/// expected columns are absent.
pub fn load_zip_population(path: &Path) -> Result<BTreeMap<String, u64>, LayersError> {
    let content =
        std::fs::read_to_string(path).map_err(|e| LayersError::unavailable(path, e))?;
    parse_zip_population(&content, path)
}

const TRACT_GEO_ID_PREFIX: &str = "1400000US";

fn parse_zip_population(content: &str, path: &Path) -> Result<BTreeMap<String, u64>, LayersError> {
    let mut reader = csv::Reader::from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| LayersError::unavailable(path, e))?
        .clone();
    let geo_id_col = header_index(&headers, "GEO_ID", path)?;
    let count_col = header_index(&headers, "B01003_001E", path)?;

    let mut populations = BTreeMap::new();
    for record in reader.records() {
        let record = record.map_err(|e| LayersError::unavailable(path, e))?;
        let Some(geo_id) = record.get(geo_id_col) else {
            continue;
        };
        if geo_id.contains(TRACT_GEO_ID_PREFIX) || geo_id.len() < 5 {
            continue;
        }
        let zip = geo_id[geo_id.len() - 5..].to_string();
        let population = record
            .get(count_col)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(0);
        populations.insert(zip, population);
    }

    Ok(populations)
}

fn header_index(
    headers: &csv::StringRecord,
    name: &str,
    path: &Path,
) -> Result<usize, LayersError> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| LayersError::unavailable(path, format!("missing '{name}' column")))
}

/// Reads a `GeoJSON` feature collection and verifies it is WGS84.
///
/// Also used by the query layer to read the enriched ZIP artifact.
///
/// # Errors
///
/// Returns [`LayersError::DataUnavailable`] if the file is missing,
/// unreadable, not a feature collection, or not WGS84.
pub fn read_feature_collection(path: &Path) -> Result<FeatureCollection, LayersError> {
    let content =
        std::fs::read_to_string(path).map_err(|e| LayersError::unavailable(path, e))?;
    parse_feature_collection(&content, path)
}

fn parse_feature_collection(
    content: &str,
    path: &Path,
) -> Result<FeatureCollection, LayersError> {
    let geojson: GeoJson = content
        .parse()
        .map_err(|e| LayersError::unavailable(path, e))?;

    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(LayersError::unavailable(
            path,
            "expected a FeatureCollection",
        ));
    };

    ensure_wgs84(&collection, path)?;
    Ok(collection)
}

/// Rejects a legacy `crs` member that names anything other than WGS84.
///
/// `GeoJSON` (RFC 7946) removed the `crs` member and fixed the reference
/// system to WGS84, but older exporters still emit it.
fn ensure_wgs84(collection: &FeatureCollection, path: &Path) -> Result<(), LayersError> {
    let Some(crs) = collection
        .foreign_members
        .as_ref()
        .and_then(|members| members.get("crs"))
    else {
        return Ok(());
    };

    let name = crs
        .get("properties")
        .and_then(|props| props.get("name"))
        .and_then(serde_json::Value::as_str)
        .unwrap_or("unspecified");

    if WGS84_CRS_NAMES.contains(&name) {
        Ok(())
    } else {
        Err(LayersError::unavailable(
            path,
            format!("layer is not WGS84 (crs: {name})"),
        ))
    }
}

/// Converts a feature's geometry to a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
fn feature_multipolygon(feature: &Feature, id: &str) -> Option<MultiPolygon<f64>> {
    let Some(geometry) = &feature.geometry else {
        log::warn!("Skipping feature '{id}' with no geometry");
        return None;
    };

    let geo_geom: geo::Geometry<f64> = geometry.clone().try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) if !mp.0.is_empty() => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => {
            log::warn!("Skipping feature '{id}' with non-polygon or empty geometry");
            None
        }
    }
}

fn feature_point(feature: &Feature) -> Option<Point<f64>> {
    let geometry = feature.geometry.as_ref()?;
    let geo_geom: geo::Geometry<f64> = geometry.clone().try_into().ok()?;
    match geo_geom {
        geo::Geometry::Point(p) => Some(p),
        _ => {
            log::warn!("Skipping non-point feature in charger layer");
            None
        }
    }
}

/// A non-empty string property, trimmed. Numeric values are accepted and
/// stringified (ZIP codes often arrive as bare numbers).
#[must_use]
pub fn string_prop(feature: &Feature, key: &str) -> Option<String> {
    feature
        .properties
        .as_ref()?
        .get(key)
        .and_then(|value| match value {
            serde_json::Value::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

/// A non-negative integer property; 0 when missing or unparseable.
#[must_use]
pub fn u64_prop(feature: &Feature, key: &str) -> u64 {
    feature
        .properties
        .as_ref()
        .and_then(|props| props.get(key))
        .and_then(|value| match value {
            serde_json::Value::Number(n) => n.as_f64().map(|f| {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                {
                    f.max(0.0).round() as u64
                }
            }),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .unwrap_or(0)
}

/// A non-negative float property; 0 when missing or unparseable.
#[must_use]
pub fn f64_prop(feature: &Feature, key: &str) -> f64 {
    feature
        .properties
        .as_ref()
        .and_then(|props| props.get(key))
        .and_then(|value| match value {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .unwrap_or(0.0)
        .max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_path() -> &'static Path {
        Path::new("fixture.geojson")
    }

    #[test]
    fn missing_file_is_data_unavailable() {
        let result = load_tracts(Path::new("does/not/exist.geojson"));
        assert!(matches!(
            result,
            Err(LayersError::DataUnavailable { .. })
        ));
    }

    #[test]
    fn parses_tract_collection() {
        let content = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"GEOID": "48453001100", "population": 4200, "median_income": 55000.0},
                "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}
            }]
        }"#;

        let collection = parse_feature_collection(content, fixture_path()).unwrap();
        assert_eq!(collection.features.len(), 1);

        let feature = &collection.features[0];
        assert_eq!(string_prop(feature, "GEOID").as_deref(), Some("48453001100"));
        assert_eq!(u64_prop(feature, "population"), 4200);
        assert!((f64_prop(feature, "median_income") - 55000.0).abs() < f64::EPSILON);
        assert!(feature_multipolygon(feature, "48453001100").is_some());
    }

    #[test]
    fn missing_demographics_default_to_zero() {
        let content = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"GEOID": "48453001100"},
                "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}
            }]
        }"#;

        let collection = parse_feature_collection(content, fixture_path()).unwrap();
        let feature = &collection.features[0];

        assert_eq!(u64_prop(feature, "population"), 0);
        assert!(f64_prop(feature, "median_income").abs() < f64::EPSILON);
    }

    #[test]
    fn non_feature_collection_is_rejected() {
        let content = r#"{"type": "Point", "coordinates": [0, 0]}"#;
        let result = parse_feature_collection(content, fixture_path());
        assert!(matches!(
            result,
            Err(LayersError::DataUnavailable { .. })
        ));
    }

    #[test]
    fn legacy_wgs84_crs_member_is_accepted() {
        let content = r#"{
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:OGC:1.3:CRS84"}},
            "features": []
        }"#;
        assert!(parse_feature_collection(content, fixture_path()).is_ok());
    }

    #[test]
    fn non_wgs84_crs_member_is_rejected() {
        let content = r#"{
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "EPSG:3857"}},
            "features": []
        }"#;
        let result = parse_feature_collection(content, fixture_path());
        assert!(matches!(
            result,
            Err(LayersError::DataUnavailable { .. })
        ));
    }

    #[test]
    fn zip_population_skips_tract_rows() {
        let csv = "GEO_ID,NAME,B01003_001E\n\
                   860Z200US78701,ZCTA5 78701,25000\n\
                   1400000US48453001100,Census Tract 11,4200\n\
                   860Z200US78704,ZCTA5 78704,not_a_number\n";

        let populations = parse_zip_population(csv, Path::new("acs.csv")).unwrap();

        assert_eq!(populations.len(), 2);
        assert_eq!(populations["78701"], 25000);
        assert_eq!(populations["78704"], 0, "Unparseable counts default to 0");
    }

    #[test]
    fn zip_population_requires_expected_columns() {
        let csv = "GEO_ID,NAME\n860Z200US78701,ZCTA5 78701\n";
        let result = parse_zip_population(csv, Path::new("acs.csv"));
        assert!(matches!(
            result,
            Err(LayersError::DataUnavailable { .. })
        ));
    }
}
