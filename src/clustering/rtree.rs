//! R-tree indexed sample points and radius queries.

use rstar::{AABB, RTree, RTreeObject};

use crate::GpsPoint;
use crate::geo_utils::{haversine_distance, search_boxes};

/// A GPS point with its index for R-tree queries
#[derive(Debug, Clone, Copy)]
pub struct IndexedPoint {
    pub idx: usize,
    pub lat: f64,
    pub lng: f64,
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lat, self.lng])
    }
}

/// Build R-tree from GPS points for efficient spatial queries
pub fn build_rtree(points: &[GpsPoint]) -> RTree<IndexedPoint> {
    let indexed: Vec<IndexedPoint> = points
        .iter()
        .enumerate()
        .map(|(i, p)| IndexedPoint {
            idx: i,
            lat: p.latitude,
            lng: p.longitude,
        })
        .collect();
    RTree::bulk_load(indexed)
}

/// Indices of all points within `radius_meters` of `center`, ascending.
///
/// The R-tree narrows candidates with degree-space boxes, split at the
/// antimeridian; haversine distance makes the final decision.
pub fn points_within(
    tree: &RTree<IndexedPoint>,
    points: &[GpsPoint],
    center: &GpsPoint,
    radius_meters: f64,
) -> Vec<usize> {
    let mut found: Vec<usize> = search_boxes(center, radius_meters)
        .iter()
        .flat_map(|b| {
            let envelope = AABB::from_corners([b.min_lat, b.min_lng], [b.max_lat, b.max_lng]);
            tree.locate_in_envelope_intersecting(&envelope)
                .filter(|p| haversine_distance(center, &points[p.idx]) <= radius_meters)
                .map(|p| p.idx)
                .collect::<Vec<_>>()
        })
        .collect();
    // Boxes split at the antimeridian share the ±180 edge
    found.sort_unstable();
    found.dedup();
    found
}
