//! # Density Clustering
//!
//! DBSCAN over GPS samples using haversine distance.
//!
//! ## Algorithm
//! 1. Cap the input to the most recent `max_points` samples (reported, not silent)
//! 2. Index points in an R-tree and compute every `eps` neighbourhood
//! 3. Visit points in input order; a point with fewer than `min_points`
//!    neighbours (itself included) is noise
//! 4. Otherwise grow a cluster breadth-first, expanding only through core points
//! 5. Drop clusters that end up smaller than `min_points`
//!
//! Visiting in input order and keeping neighbourhoods sorted makes the output
//! identical across runs for the same input.

mod rtree;

pub use rtree::{IndexedPoint, build_rtree, points_within};

use std::collections::VecDeque;

use log::info;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::ClusterConfig;
use crate::geo_utils::{compute_center, haversine_distance, percentile};
use crate::{Bounds, GpsPoint, LocationSample};

/// Smallest radius a detected place can have, in meters.
pub const MIN_CLUSTER_RADIUS: f64 = 25.0;
/// Largest radius a detected place can have, in meters.
pub const MAX_CLUSTER_RADIUS: f64 = 200.0;
/// Percentile of member distances used as the cluster radius.
const RADIUS_PERCENTILE: f64 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Unvisited,
    Noise,
    Assigned,
}

/// Run DBSCAN and return clusters as ascending lists of point indices.
///
/// Clusters are ordered by their first (seed) point.
pub fn dbscan(points: &[GpsPoint], eps_meters: f64, min_points: usize) -> Vec<Vec<usize>> {
    let n = points.len();
    if n == 0 || min_points == 0 || n < min_points {
        return Vec::new();
    }

    let tree = build_rtree(points);

    #[cfg(feature = "parallel")]
    let neighbourhoods: Vec<Vec<usize>> = (0..n)
        .into_par_iter()
        .map(|i| points_within(&tree, points, &points[i], eps_meters))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let neighbourhoods: Vec<Vec<usize>> = (0..n)
        .map(|i| points_within(&tree, points, &points[i], eps_meters))
        .collect();

    let mut labels = vec![Label::Unvisited; n];
    let mut clusters = Vec::new();

    for seed in 0..n {
        if labels[seed] != Label::Unvisited {
            continue;
        }
        if neighbourhoods[seed].len() < min_points {
            labels[seed] = Label::Noise;
            continue;
        }

        labels[seed] = Label::Assigned;
        let mut members = vec![seed];
        let mut queue: VecDeque<usize> = neighbourhoods[seed]
            .iter()
            .copied()
            .filter(|&j| j != seed)
            .collect();

        while let Some(j) = queue.pop_front() {
            match labels[j] {
                Label::Assigned => {}
                // Border point: joins the cluster but does not expand it
                Label::Noise => {
                    labels[j] = Label::Assigned;
                    members.push(j);
                }
                Label::Unvisited => {
                    labels[j] = Label::Assigned;
                    members.push(j);
                    if neighbourhoods[j].len() >= min_points {
                        queue.extend(
                            neighbourhoods[j]
                                .iter()
                                .copied()
                                .filter(|&k| labels[k] != Label::Assigned),
                        );
                    }
                }
            }
        }

        if members.len() >= min_points {
            members.sort_unstable();
            clusters.push(members);
        }
    }

    clusters
}

/// A cluster of samples that may become a place.
#[derive(Debug, Clone)]
pub struct ClusterCandidate {
    /// Member samples in time order
    pub samples: Vec<LocationSample>,
    /// Mean latitude/longitude of the members
    pub centroid: GpsPoint,
    /// 90th percentile distance from the centroid, clamped to [25, 200] meters
    pub radius: f64,
}

impl ClusterCandidate {
    /// Build a candidate from member samples. Returns `None` for empty input.
    pub fn from_samples(mut samples: Vec<LocationSample>) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        samples.sort_by_key(|s| s.timestamp);

        let points: Vec<GpsPoint> = samples.iter().map(|s| s.point()).collect();
        let centroid = compute_center(&points);
        let distances: Vec<f64> = points
            .iter()
            .map(|p| haversine_distance(&centroid, p))
            .collect();
        let radius = percentile(&distances, RADIUS_PERCENTILE)
            .clamp(MIN_CLUSTER_RADIUS, MAX_CLUSTER_RADIUS);

        Some(Self {
            samples,
            centroid,
            radius,
        })
    }

    pub fn points(&self) -> Vec<GpsPoint> {
        self.samples.iter().map(|s| s.point()).collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(&self.points())
    }

    /// Mean reported accuracy of the members in meters.
    pub fn average_accuracy(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().map(|s| s.accuracy_meters).sum::<f64>() / self.samples.len() as f64
    }

    /// Time between the first and last member sample.
    pub fn time_span(&self) -> chrono::Duration {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => chrono::Duration::zero(),
        }
    }
}

/// Counts from one clustering run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClusterStats {
    pub input: usize,
    /// Oldest samples dropped by the `max_points` cap
    pub truncated: usize,
    pub clusters: usize,
    /// Samples that ended up in no cluster
    pub noise: usize,
}

/// Cluster time-ordered samples into place candidates.
pub fn cluster_samples(
    samples: &[LocationSample],
    config: &ClusterConfig,
) -> Vec<ClusterCandidate> {
    cluster_samples_with_stats(samples, config).0
}

/// Cluster samples and report cap truncation and noise counts.
pub fn cluster_samples_with_stats(
    samples: &[LocationSample],
    config: &ClusterConfig,
) -> (Vec<ClusterCandidate>, ClusterStats) {
    let config = config.sanitized();
    let mut stats = ClusterStats {
        input: samples.len(),
        ..ClusterStats::default()
    };

    let window = if samples.len() > config.max_points {
        stats.truncated = samples.len() - config.max_points;
        info!(
            "Clustering cap reached: using the most recent {} of {} samples ({} dropped)",
            config.max_points,
            samples.len(),
            stats.truncated
        );
        &samples[stats.truncated..]
    } else {
        samples
    };

    let points: Vec<GpsPoint> = window.iter().map(|s| s.point()).collect();
    let index_clusters = dbscan(&points, config.eps_meters, config.min_points);

    let clustered: usize = index_clusters.iter().map(|c| c.len()).sum();
    stats.noise = window.len() - clustered;

    let candidates: Vec<ClusterCandidate> = index_clusters
        .into_iter()
        .filter_map(|members| {
            ClusterCandidate::from_samples(members.into_iter().map(|i| window[i].clone()).collect())
        })
        .collect();
    stats.clusters = candidates.len();

    (candidates, stats)
}
