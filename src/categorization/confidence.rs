//! Place confidence.
//!
//! Confidence measures how well observed a place is, not how sure we are of
//! its category. It is built from sample count, GPS accuracy and how long
//! the place has been observed.

use chrono::Duration;

use crate::clustering::ClusterCandidate;
use crate::config::ConfidenceConfig;

const BASE: f64 = 0.3;
const MAX_SAMPLE_BONUS: f64 = 0.3;

/// Confidence for a cluster, clamped to the configured range.
pub fn estimate_confidence(candidate: &ClusterCandidate, config: &ConfidenceConfig) -> f64 {
    confidence_from_parts(
        candidate.len(),
        candidate.average_accuracy(),
        candidate.time_span(),
        config,
    )
}

/// Confidence from its raw ingredients.
pub fn confidence_from_parts(
    sample_count: usize,
    average_accuracy_meters: f64,
    span: Duration,
    config: &ConfidenceConfig,
) -> f64 {
    let config = config.sanitized();

    let sample_bonus = (sample_count as f64 / config.saturation_sample_count as f64).min(1.0)
        * MAX_SAMPLE_BONUS;

    let raw = BASE + sample_bonus + accuracy_bonus(average_accuracy_meters) + span_bonus(span);
    if raw.is_nan() {
        return config.min_confidence;
    }
    raw.clamp(config.min_confidence, config.max_confidence)
}

fn accuracy_bonus(average_accuracy_meters: f64) -> f64 {
    match average_accuracy_meters {
        a if !a.is_finite() => 0.0,
        a if a <= 5.0 => 0.2,
        a if a <= 10.0 => 0.15,
        a if a <= 20.0 => 0.1,
        a if a <= 50.0 => 0.05,
        _ => 0.0,
    }
}

fn span_bonus(span: Duration) -> f64 {
    if span >= Duration::days(7) {
        0.15
    } else if span >= Duration::days(1) {
        0.1
    } else {
        0.0
    }
}
