//! Duplicate suppression against existing places.
//!
//! Two checks, either of which marks a cluster as a duplicate:
//! - the cluster centroid is closer than `minimum_distance_between_places`
//!   to an existing place centre (catches small tight clusters)
//! - more than `max_overlap_ratio` of the cluster's points lie inside an
//!   existing place's radius (catches large or irregular places)

use uuid::Uuid;

use crate::config::DuplicateConfig;
use crate::geo_utils::haversine_distance;
use crate::{GpsPoint, Place};

/// Outcome of comparing a cluster against nearby places.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateAssessment {
    /// Distance from the cluster centroid to the closest existing centre
    pub min_distance_to_existing: Option<f64>,
    pub nearest_place_id: Option<Uuid>,
    /// Fraction of member points inside any existing place's radius
    pub overlap_ratio: f64,
    /// Existing place containing the most member points
    pub most_overlapping_place_id: Option<Uuid>,
    pub is_duplicate: bool,
}

impl DuplicateAssessment {
    /// The existing place this cluster duplicates, if any.
    ///
    /// Centroid proximity takes precedence over overlap.
    pub fn matched_place_id(&self, config: &DuplicateConfig) -> Option<Uuid> {
        if !self.is_duplicate {
            return None;
        }
        match self.min_distance_to_existing {
            Some(d) if d < config.minimum_distance_between_places => self.nearest_place_id,
            _ => self.most_overlapping_place_id.or(self.nearest_place_id),
        }
    }
}

/// Compare a cluster (centroid + member points) against existing places.
pub fn assess_duplicate(
    centroid: &GpsPoint,
    members: &[GpsPoint],
    existing: &[Place],
    config: &DuplicateConfig,
) -> DuplicateAssessment {
    let config = config.sanitized();

    let nearest = existing
        .iter()
        .map(|place| (place.id, haversine_distance(centroid, &place.center())))
        .min_by(|a, b| a.1.total_cmp(&b.1));

    let mut per_place = vec![0usize; existing.len()];
    let mut inside_any = 0usize;
    for point in members {
        let mut inside = false;
        for (i, place) in existing.iter().enumerate() {
            if haversine_distance(point, &place.center()) <= place.radius {
                per_place[i] += 1;
                inside = true;
            }
        }
        if inside {
            inside_any += 1;
        }
    }

    let overlap_ratio = if members.is_empty() {
        0.0
    } else {
        inside_any as f64 / members.len() as f64
    };

    // First place wins ties so the result is stable for a stable input order.
    let most_overlapping_place_id = per_place
        .iter()
        .enumerate()
        .filter(|(_, count)| **count > 0)
        .fold(None::<(usize, usize)>, |best, (i, &count)| match best {
            Some((_, best_count)) if count <= best_count => best,
            _ => Some((i, count)),
        })
        .map(|(i, _)| existing[i].id);

    let too_close = nearest
        .map(|(_, d)| d < config.minimum_distance_between_places)
        .unwrap_or(false);

    DuplicateAssessment {
        min_distance_to_existing: nearest.map(|(_, d)| d),
        nearest_place_id: nearest.map(|(id, _)| id),
        overlap_ratio,
        most_overlapping_place_id,
        is_duplicate: too_close || overlap_ratio > config.max_overlap_ratio,
    }
}
