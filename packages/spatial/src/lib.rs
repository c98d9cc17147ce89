#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! In-memory spatial index for polygon layers.
//!
//! Builds an R-tree over a polygon layer once, then answers the two join
//! shapes the enrichment pipeline needs: per-polygon point counts (charger
//! attribution) and polygon-overlap queries (tract-to-division aggregation
//! and ZIP city assignment). Every lookup prefilters candidates by bounding
//! box before running the exact geometry predicate.

pub mod project;

use std::collections::BTreeMap;

use geo::{BoundingRect, BooleanOps, Contains, Intersects, MultiPolygon, Point};
use rstar::{AABB, RTree, RTreeObject};

/// Containment predicate for point-in-polygon joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinPredicate {
    /// Point lies in the polygon interior. Points exactly on a shared
    /// boundary match no polygon under this predicate.
    Within,
    /// Point lies in the interior or on the boundary. A point on a shared
    /// boundary matches every touching polygon.
    Intersects,
}

/// A polygon stored in the R-tree with its layer identifier.
struct AreaEntry {
    id: String,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for AreaEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// An overlap match returned by [`AreaIndex::overlaps`].
#[derive(Debug, Clone, PartialEq)]
pub struct Overlap<'a> {
    /// Identifier of the matched entry.
    pub id: &'a str,
    /// Overlap area in square kilometers.
    pub area_km2: f64,
}

/// Pre-built R-tree index over one polygon layer.
///
/// Constructed once per layer and shared immutably by every join in the
/// run. Identifiers are whatever key the layer joins on (tract GEOID, ZIP
/// code, admin name) and need not be unique; each entry matches
/// independently.
pub struct AreaIndex {
    tree: RTree<AreaEntry>,
    ids: Vec<String>,
}

impl AreaIndex {
    /// Builds the index from `(id, polygon)` pairs.
    #[must_use]
    pub fn build(areas: Vec<(String, MultiPolygon<f64>)>) -> Self {
        let ids = areas.iter().map(|(id, _)| id.clone()).collect();
        let entries: Vec<AreaEntry> = areas
            .into_iter()
            .map(|(id, polygon)| AreaEntry {
                id,
                envelope: compute_envelope(&polygon),
                polygon,
            })
            .collect();

        log::debug!("Built spatial index over {} polygons", entries.len());

        Self {
            tree: RTree::bulk_load(entries),
            ids,
        }
    }

    /// Number of indexed polygons.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Counts points per polygon under the given predicate.
    ///
    /// Left-join semantics: every indexed polygon appears in the result,
    /// zero-filled when nothing matched. A point contained by several
    /// overlapping polygons is counted once per containing polygon.
    #[must_use]
    pub fn count_points(&self, points: &[Point<f64>], predicate: JoinPredicate) -> BTreeMap<String, u64> {
        let mut counts: BTreeMap<String, u64> =
            self.ids.iter().map(|id| (id.clone(), 0)).collect();

        for point in points {
            let query_env = AABB::from_point([point.x(), point.y()]);
            for entry in self.tree.locate_in_envelope_intersecting(&query_env) {
                let matched = match predicate {
                    JoinPredicate::Within => entry.polygon.contains(point),
                    JoinPredicate::Intersects => entry.polygon.intersects(point),
                };
                if matched {
                    if let Some(count) = counts.get_mut(&entry.id) {
                        *count += 1;
                    }
                }
            }
        }

        counts
    }

    /// Identifiers of every indexed polygon that intersects `polygon`.
    #[must_use]
    pub fn intersecting(&self, polygon: &MultiPolygon<f64>) -> Vec<&str> {
        let Some(query_env) = polygon_envelope(polygon) else {
            return Vec::new();
        };

        self.tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.polygon.intersects(polygon))
            .map(|entry| entry.id.as_str())
            .collect()
    }

    /// Intersecting entries ranked by overlap area with `polygon`.
    ///
    /// Sorted by descending overlap area, ties broken by ascending id, so
    /// downstream "first match" selection is deterministic.
    #[must_use]
    pub fn overlaps(&self, polygon: &MultiPolygon<f64>) -> Vec<Overlap<'_>> {
        let Some(query_env) = polygon_envelope(polygon) else {
            return Vec::new();
        };

        let mut matches: Vec<Overlap<'_>> = self
            .tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.polygon.intersects(polygon))
            .map(|entry| Overlap {
                id: entry.id.as_str(),
                area_km2: project::mercator_area_km2(&entry.polygon.intersection(polygon)),
            })
            .collect();

        matches.sort_by(|a, b| {
            b.area_km2
                .total_cmp(&a.area_km2)
                .then_with(|| a.id.cmp(b.id))
        });

        matches
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    polygon_envelope(mp).unwrap_or_else(|| AABB::from_point([0.0, 0.0]))
}

fn polygon_envelope(mp: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    mp.bounding_rect().map(|rect| {
        AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square(min_x: f64, min_y: f64, size: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: min_x, y: min_y),
            (x: min_x + size, y: min_y),
            (x: min_x + size, y: min_y + size),
            (x: min_x, y: min_y + size),
            (x: min_x, y: min_y),
        ]])
    }

    fn two_adjacent_squares() -> AreaIndex {
        AreaIndex::build(vec![
            ("a".to_string(), square(0.0, 0.0, 1.0)),
            ("b".to_string(), square(1.0, 0.0, 1.0)),
        ])
    }

    #[test]
    fn counts_points_within_each_polygon() {
        let index = two_adjacent_squares();
        let points = vec![
            Point::new(0.5, 0.5),
            Point::new(0.25, 0.75),
            Point::new(1.5, 0.5),
        ];

        let counts = index.count_points(&points, JoinPredicate::Within);

        assert_eq!(counts["a"], 2);
        assert_eq!(counts["b"], 1);
    }

    #[test]
    fn zero_count_polygons_are_present() {
        let index = AreaIndex::build(vec![
            ("near".to_string(), square(0.0, 0.0, 1.0)),
            ("far".to_string(), square(100.0, 100.0, 1.0)),
        ]);

        let counts = index.count_points(&[Point::new(0.5, 0.5)], JoinPredicate::Within);

        assert_eq!(counts["near"], 1);
        assert_eq!(
            counts["far"], 0,
            "Polygons with no matches must still appear with count 0"
        );
    }

    #[test]
    fn boundary_point_matches_under_intersects_only() {
        let index = two_adjacent_squares();
        // On the shared edge between "a" and "b".
        let boundary = vec![Point::new(1.0, 0.5)];

        let within = index.count_points(&boundary, JoinPredicate::Within);
        assert_eq!(within["a"], 0);
        assert_eq!(within["b"], 0);

        let intersects = index.count_points(&boundary, JoinPredicate::Intersects);
        assert_eq!(intersects["a"], 1, "Boundary point counts for each toucher");
        assert_eq!(intersects["b"], 1, "Boundary point counts for each toucher");
    }

    #[test]
    fn overlapping_polygons_each_count_a_shared_point() {
        let index = AreaIndex::build(vec![
            ("outer".to_string(), square(0.0, 0.0, 2.0)),
            ("inner".to_string(), square(0.5, 0.5, 1.0)),
        ]);

        let counts = index.count_points(&[Point::new(1.0, 1.0)], JoinPredicate::Within);

        assert_eq!(counts["outer"], 1);
        assert_eq!(counts["inner"], 1);
    }

    #[test]
    fn intersecting_finds_touching_polygons() {
        let index = two_adjacent_squares();
        let query = square(0.5, 0.25, 0.5);

        let mut ids = index.intersecting(&query);
        ids.sort_unstable();

        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn intersecting_empty_query_matches_nothing() {
        let index = two_adjacent_squares();
        let empty = MultiPolygon::<f64>(vec![]);

        assert!(index.intersecting(&empty).is_empty());
    }

    #[test]
    fn overlaps_ranks_by_descending_area() {
        let index = AreaIndex::build(vec![
            ("small".to_string(), square(0.0, 0.0, 0.2)),
            ("large".to_string(), square(0.0, 0.0, 1.0)),
        ]);
        let query = square(0.0, 0.0, 1.0);

        let overlaps = index.overlaps(&query);

        assert_eq!(overlaps.len(), 2);
        assert_eq!(overlaps[0].id, "large");
        assert_eq!(overlaps[1].id, "small");
        assert!(overlaps[0].area_km2 > overlaps[1].area_km2);
    }

    #[test]
    fn overlap_ties_break_by_name() {
        // Identical polygons, so identical overlap with any query.
        let index = AreaIndex::build(vec![
            ("zeta".to_string(), square(0.0, 0.0, 1.0)),
            ("alpha".to_string(), square(0.0, 0.0, 1.0)),
        ]);
        let query = square(0.0, 0.0, 1.0);

        let overlaps = index.overlaps(&query);

        assert_eq!(overlaps[0].id, "alpha");
        assert_eq!(overlaps[1].id, "zeta");
    }
}
