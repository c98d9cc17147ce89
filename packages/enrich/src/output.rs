//! Artifact writing for the enrichment pipeline.
//!
//! All artifacts are `GeoJSON` feature collections with flat property maps
//! (plus a ranking CSV for the ZIP table). Property keys on the enriched
//! ZIP artifact are a compatibility contract with downstream consumers and
//! must not change: `ZIP`, `city`, `population`, `ev_poi_count`,
//! `evs_per_capita`, `area_km2`, `evs_per_km2`, `underserved_score`.
//!
//! Files are written to a `.tmp` sibling and renamed into place, so an
//! aborted run never publishes a partial table.

use std::path::Path;

use charge_map_geography_models::{EnrichedZip, ScoredAdmin, ScoredTract};
use geo::MultiPolygon;
use geojson::{Feature, FeatureCollection, GeoJson};
use serde_json::{Map, Value};

use crate::EnrichError;

/// Writes the per-tract score artifact.
///
/// # Errors
///
/// Returns [`EnrichError::Io`] if the file cannot be written.
pub fn write_tract_scores(path: &Path, tracts: &[ScoredTract]) -> Result<(), EnrichError> {
    let features = tracts
        .iter()
        .map(|tract| {
            let mut props = Map::new();
            props.insert("GEOID".to_string(), Value::from(tract.geoid.clone()));
            props.insert("population".to_string(), Value::from(tract.population));
            props.insert(
                "median_income".to_string(),
                Value::from(tract.median_income),
            );
            props.insert("ev_poi_count".to_string(), Value::from(tract.ev_poi_count));
            props.insert(
                "population_score".to_string(),
                Value::from(tract.population_score),
            );
            props.insert("equity_score".to_string(), Value::from(tract.equity_score));
            feature(&tract.geometry, props)
        })
        .collect();

    write_collection(path, features)
}

/// Writes the per-division score artifact.
///
/// # Errors
///
/// Returns [`EnrichError::Io`] if the file cannot be written.
pub fn write_admin_scores(path: &Path, divisions: &[ScoredAdmin]) -> Result<(), EnrichError> {
    let features = divisions
        .iter()
        .map(|division| {
            let mut props = Map::new();
            props.insert("name".to_string(), Value::from(division.name.clone()));
            props.insert(
                "subtype".to_string(),
                Value::from(division.subtype.to_string()),
            );
            props.insert(
                "total_population".to_string(),
                Value::from(division.total_population),
            );
            props.insert(
                "average_income".to_string(),
                Value::from(division.average_income),
            );
            props.insert(
                "ev_poi_count".to_string(),
                Value::from(division.ev_poi_count),
            );
            props.insert(
                "population_score".to_string(),
                Value::from(division.population_score),
            );
            props.insert(
                "equity_score".to_string(),
                Value::from(division.equity_score),
            );
            feature(&division.geometry, props)
        })
        .collect();

    write_collection(path, features)
}

/// Writes the enriched ZIP table, the pipeline's primary artifact.
///
/// # Errors
///
/// Returns [`EnrichError::Io`] if the file cannot be written.
pub fn write_enriched_zips(path: &Path, zips: &[EnrichedZip]) -> Result<(), EnrichError> {
    let features = zips.iter().map(zip_feature).collect();
    write_collection(path, features)
}

/// Builds the `GeoJSON` feature for one enriched ZIP record.
#[must_use]
pub fn zip_feature(zip: &EnrichedZip) -> Feature {
    let mut props = Map::new();
    props.insert("ZIP".to_string(), Value::from(zip.zip.clone()));
    props.insert(
        "city".to_string(),
        zip.city.clone().map_or(Value::Null, Value::from),
    );
    props.insert("population".to_string(), Value::from(zip.population));
    props.insert("ev_poi_count".to_string(), Value::from(zip.ev_poi_count));
    props.insert(
        "evs_per_capita".to_string(),
        Value::from(zip.evs_per_capita),
    );
    props.insert("area_km2".to_string(), Value::from(zip.area_km2));
    props.insert("evs_per_km2".to_string(), Value::from(zip.evs_per_km2));
    props.insert(
        "underserved_score".to_string(),
        Value::from(zip.underserved_score),
    );
    feature(&zip.geometry, props)
}

/// Writes the ZIP ranking CSV, sorted by descending underserved score
/// (ties by ZIP) for operator inspection.
///
/// # Errors
///
/// Returns [`EnrichError::Io`] if the file cannot be written.
pub fn write_zip_ranking_csv(path: &Path, zips: &[EnrichedZip]) -> Result<(), EnrichError> {
    let mut ranked: Vec<&EnrichedZip> = zips.iter().collect();
    ranked.sort_by(|a, b| {
        b.underserved_score
            .total_cmp(&a.underserved_score)
            .then_with(|| a.zip.cmp(&b.zip))
    });

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "ZIP",
            "city",
            "population",
            "ev_poi_count",
            "evs_per_capita",
            "area_km2",
            "evs_per_km2",
            "underserved_score",
        ])
        .map_err(into_io)?;

    for zip in ranked {
        writer
            .write_record([
                zip.zip.clone(),
                zip.city.clone().unwrap_or_default(),
                zip.population.to_string(),
                zip.ev_poi_count.to_string(),
                zip.evs_per_capita.to_string(),
                zip.area_km2.to_string(),
                zip.evs_per_km2.to_string(),
                zip.underserved_score.to_string(),
            ])
            .map_err(into_io)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| EnrichError::Io(std::io::Error::other(e.to_string())))?;
    write_atomic(path, &bytes)
}

fn into_io(error: csv::Error) -> EnrichError {
    EnrichError::Io(std::io::Error::other(error.to_string()))
}

fn feature(geometry: &MultiPolygon<f64>, props: Map<String, Value>) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(geometry))),
        id: None,
        properties: Some(props),
        foreign_members: None,
    }
}

fn write_collection(path: &Path, features: Vec<Feature>) -> Result<(), EnrichError> {
    let collection = GeoJson::FeatureCollection(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    });

    write_atomic(path, collection.to_string().as_bytes())?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

/// Writes via a `.tmp` sibling + rename so a crash mid-write never leaves
/// a truncated artifact at the published path.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), EnrichError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn enriched(zip: &str, city: Option<&str>, underserved_score: f64) -> EnrichedZip {
        EnrichedZip {
            zip: zip.to_string(),
            population: 20_000,
            ev_poi_count: 3,
            evs_per_capita: 0.0001,
            area_km2: 10.0,
            evs_per_km2: 0.2727,
            underserved_score,
            city: city.map(str::to_string),
            geometry: MultiPolygon(vec![polygon![
                (x: 0.0, y: 0.0),
                (x: 1.0, y: 0.0),
                (x: 1.0, y: 1.0),
                (x: 0.0, y: 1.0),
                (x: 0.0, y: 0.0),
            ]]),
        }
    }

    #[test]
    fn zip_feature_carries_the_contract_keys() {
        let feature = zip_feature(&enriched("78701", Some("Austin"), 42.0));
        let props = feature.properties.expect("feature has properties");

        for key in [
            "ZIP",
            "city",
            "population",
            "ev_poi_count",
            "evs_per_capita",
            "area_km2",
            "evs_per_km2",
            "underserved_score",
        ] {
            assert!(props.contains_key(key), "missing contract key '{key}'");
        }
        assert_eq!(props["ZIP"], Value::from("78701"));
        assert_eq!(props["city"], Value::from("Austin"));
    }

    #[test]
    fn unset_city_serializes_as_null() {
        let feature = zip_feature(&enriched("79936", None, 10.0));
        let props = feature.properties.expect("feature has properties");
        assert_eq!(props["city"], Value::Null);
    }
}
