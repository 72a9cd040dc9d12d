//! GPS quality filtering.
//!
//! Removes samples that would distort clustering:
//! - invalid coordinates (NaN, out of range)
//! - poor horizontal accuracy
//! - high-confidence driving/cycling samples
//! - impossible jumps (speed from the previous kept sample)
//! - sub-jitter movement that is also too close in time

use log::debug;

use crate::config::QualityFilterConfig;
use crate::geo_utils::haversine_distance;
use crate::LocationSample;

/// Per-reason counts from one filter run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub input: usize,
    pub invalid: usize,
    pub inaccurate: usize,
    pub vehicle: usize,
    pub too_fast: usize,
    pub jitter: usize,
    pub kept: usize,
}

/// Filter samples, returning the kept samples in time order.
///
/// # Example
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use placematch::{LocationSample, QualityFilterConfig, filter_samples};
///
/// let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
/// let samples = vec![
///     LocationSample::new(40.0, -74.0, t0, 10.0),
///     // ~200m in 2 seconds: 360 km/h
///     LocationSample::new(40.0018, -74.0, t0 + Duration::seconds(2), 10.0),
/// ];
/// let kept = filter_samples(&samples, &QualityFilterConfig::default());
/// assert_eq!(kept.len(), 1);
/// ```
pub fn filter_samples(
    samples: &[LocationSample],
    config: &QualityFilterConfig,
) -> Vec<LocationSample> {
    filter_samples_with_stats(samples, config).0
}

/// Filter samples and report why samples were dropped.
pub fn filter_samples_with_stats(
    samples: &[LocationSample],
    config: &QualityFilterConfig,
) -> (Vec<LocationSample>, FilterStats) {
    let config = config.sanitized();
    let mut stats = FilterStats {
        input: samples.len(),
        ..FilterStats::default()
    };

    let mut accurate: Vec<&LocationSample> = Vec::with_capacity(samples.len());
    for (index, sample) in samples.iter().enumerate() {
        if let Err(e) = sample.validate(index) {
            debug!("Dropping sample: {}", e);
            stats.invalid += 1;
            continue;
        }
        if sample.accuracy_meters > config.max_accuracy_meters {
            stats.inaccurate += 1;
            continue;
        }
        if config.suppress_vehicle_samples && is_vehicle_sample(sample, &config) {
            stats.vehicle += 1;
            continue;
        }
        accurate.push(sample);
    }

    // Stable sort keeps equal timestamps in input order.
    accurate.sort_by_key(|s| s.timestamp);

    if accurate.len() < 2 {
        stats.kept = accurate.len();
        return (accurate.into_iter().cloned().collect(), stats);
    }

    let mut kept: Vec<LocationSample> = Vec::with_capacity(accurate.len());
    kept.push(accurate[0].clone());

    for sample in accurate.into_iter().skip(1) {
        let Some(prev) = kept.last() else {
            break;
        };
        let elapsed_secs = (sample.timestamp - prev.timestamp).num_milliseconds() as f64 / 1000.0;

        // Identical timestamps: no speed can be computed.
        if elapsed_secs <= 0.0 {
            kept.push(sample.clone());
            continue;
        }

        let distance = haversine_distance(&prev.point(), &sample.point());
        let speed_kmh = distance / elapsed_secs * 3.6;
        if speed_kmh > config.max_speed_kmh {
            stats.too_fast += 1;
            continue;
        }

        if distance >= config.min_movement_meters || elapsed_secs >= config.min_time_gap_seconds {
            kept.push(sample.clone());
        } else {
            stats.jitter += 1;
        }
    }

    stats.kept = kept.len();
    (kept, stats)
}

fn is_vehicle_sample(sample: &LocationSample, config: &QualityFilterConfig) -> bool {
    match (sample.activity_label, sample.activity_confidence) {
        (Some(label), Some(confidence)) => {
            label.is_vehicle() && confidence > config.vehicle_confidence_threshold
        }
        _ => false,
    }
}
