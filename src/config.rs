//! Configuration value objects.
//!
//! Every threshold used by the pipeline lives here. All structs deserialize
//! with per-field defaults so partial JSON configs work, and every struct has
//! a `sanitized()` method that clamps out-of-range values instead of
//! rejecting them.

use serde::{Deserialize, Serialize};

use crate::PlaceCategory;
use crate::auto_accept::AutoAcceptStrategy;

/// GPS quality filter thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityFilterConfig {
    /// Samples with a worse accuracy radius are dropped.
    /// Default: 50.0 meters
    pub max_accuracy_meters: f64,

    /// Samples implying a faster jump from the previous kept sample are dropped.
    /// Default: 200.0 km/h
    pub max_speed_kmh: f64,

    /// A sample closer than `min_movement_meters` is still kept if at least
    /// this much time has passed since the previous kept sample.
    /// Default: 60.0 seconds
    pub min_time_gap_seconds: f64,

    /// Movement below this is treated as GPS jitter.
    /// Default: 5.0 meters
    pub min_movement_meters: f64,

    /// Drop samples labelled as driving/cycling with high confidence.
    /// Default: true
    pub suppress_vehicle_samples: bool,

    /// Activity confidence above which vehicle samples are dropped.
    /// Default: 0.75
    pub vehicle_confidence_threshold: f64,
}

impl Default for QualityFilterConfig {
    fn default() -> Self {
        Self {
            max_accuracy_meters: 50.0,
            max_speed_kmh: 200.0,
            min_time_gap_seconds: 60.0,
            min_movement_meters: 5.0,
            suppress_vehicle_samples: true,
            vehicle_confidence_threshold: 0.75,
        }
    }
}

impl QualityFilterConfig {
    pub fn sanitized(&self) -> Self {
        Self {
            max_accuracy_meters: non_negative(self.max_accuracy_meters, 50.0),
            max_speed_kmh: non_negative(self.max_speed_kmh, 200.0),
            min_time_gap_seconds: non_negative(self.min_time_gap_seconds, 60.0),
            min_movement_meters: non_negative(self.min_movement_meters, 5.0),
            suppress_vehicle_samples: self.suppress_vehicle_samples,
            vehicle_confidence_threshold: unit(self.vehicle_confidence_threshold, 0.75),
        }
    }
}

/// DBSCAN parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Maximum neighbour distance.
    /// Default: 50.0 meters
    pub eps_meters: f64,

    /// Minimum neighbourhood size (including the point itself) for a core point.
    /// Default: 5
    pub min_points: usize,

    /// Maximum number of points clustered per pass. Clustering is quadratic in
    /// the worst case, so the most recent `max_points` samples are used and the
    /// rest are reported as truncated.
    /// Default: 2000
    pub max_points: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            eps_meters: 50.0,
            min_points: 5,
            max_points: 2000,
        }
    }
}

impl ClusterConfig {
    pub fn sanitized(&self) -> Self {
        Self {
            eps_meters: positive(self.eps_meters, 50.0),
            min_points: self.min_points.max(1),
            max_points: self.max_points.max(1),
        }
    }
}

/// Visit session segmentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// A gap strictly longer than this starts a new session.
    /// Default: 30.0 minutes
    pub session_break_minutes: f64,

    /// Sessions shorter than this are discarded.
    /// Default: 5.0 minutes
    pub min_visit_duration_minutes: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_break_minutes: 30.0,
            min_visit_duration_minutes: 5.0,
        }
    }
}

impl SessionConfig {
    pub fn sanitized(&self) -> Self {
        Self {
            session_break_minutes: positive(self.session_break_minutes, 30.0),
            min_visit_duration_minutes: non_negative(self.min_visit_duration_minutes, 5.0),
        }
    }
}

/// Category scorer thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    /// Minimum winning score; below it the category is Unknown.
    /// Default: 0.5
    pub acceptance_threshold: f64,

    /// Offset from UTC used to derive local hour and weekday.
    /// Default: 0
    pub utc_offset_minutes: i32,

    /// Night/evening sample ratio above which Home is confident.
    /// Default: 0.6
    pub home_night_ratio: f64,

    /// Night/evening sample ratio above which Home is merely possible.
    /// Default: 0.4
    pub home_possible_ratio: f64,

    /// Office-hour sample ratio needed for a confident Work score.
    /// Default: 0.5
    pub work_hour_ratio: f64,

    /// School-hour sample ratio needed for a confident Education score.
    /// Default: 0.5
    pub school_hour_ratio: f64,

    /// Weekday sample ratio needed for confident Work/Education scores.
    /// Default: 0.7
    pub weekday_ratio: f64,

    /// Session break used when deriving visit patterns.
    /// Default: 60.0 minutes
    pub pattern_session_break_minutes: f64,

    /// Minimum session length used when deriving visit patterns.
    /// Default: 5.0 minutes
    pub pattern_min_session_minutes: f64,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: 0.5,
            utc_offset_minutes: 0,
            home_night_ratio: 0.6,
            home_possible_ratio: 0.4,
            work_hour_ratio: 0.5,
            school_hour_ratio: 0.5,
            weekday_ratio: 0.7,
            pattern_session_break_minutes: 60.0,
            pattern_min_session_minutes: 5.0,
        }
    }
}

impl ScorerConfig {
    pub fn sanitized(&self) -> Self {
        let home_night_ratio = unit(self.home_night_ratio, 0.6);
        Self {
            acceptance_threshold: unit(self.acceptance_threshold, 0.5),
            utc_offset_minutes: self.utc_offset_minutes.clamp(-14 * 60, 14 * 60),
            home_night_ratio,
            home_possible_ratio: unit(self.home_possible_ratio, 0.4).min(home_night_ratio),
            work_hour_ratio: unit(self.work_hour_ratio, 0.5),
            school_hour_ratio: unit(self.school_hour_ratio, 0.5),
            weekday_ratio: unit(self.weekday_ratio, 0.7),
            pattern_session_break_minutes: positive(self.pattern_session_break_minutes, 60.0),
            pattern_min_session_minutes: non_negative(self.pattern_min_session_minutes, 5.0),
        }
    }
}

/// Place confidence policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    /// Default: 0.3
    pub min_confidence: f64,
    /// Default: 0.85
    pub max_confidence: f64,
    /// Sample count at which the sample-count contribution saturates.
    /// Default: 30
    pub saturation_sample_count: usize,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.3,
            max_confidence: 0.85,
            saturation_sample_count: 30,
        }
    }
}

impl ConfidenceConfig {
    pub fn sanitized(&self) -> Self {
        let min_confidence = unit(self.min_confidence, 0.3);
        Self {
            min_confidence,
            max_confidence: unit(self.max_confidence, 0.85).max(min_confidence),
            saturation_sample_count: self.saturation_sample_count.max(1),
        }
    }
}

/// Duplicate suppression against existing places.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicateConfig {
    /// Centroids closer than this to an existing place are duplicates.
    /// Default: 25.0 meters
    pub minimum_distance_between_places: f64,

    /// A cluster with more than this fraction of points inside an existing
    /// place's radius is a duplicate.
    /// Default: 0.5
    pub max_overlap_ratio: f64,

    /// Radius of the existing-place lookup around a cluster centroid.
    /// Default: 0.5 km
    pub search_radius_km: f64,
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            minimum_distance_between_places: 25.0,
            max_overlap_ratio: 0.5,
            search_radius_km: 0.5,
        }
    }
}

impl DuplicateConfig {
    pub fn sanitized(&self) -> Self {
        Self {
            minimum_distance_between_places: non_negative(
                self.minimum_distance_between_places,
                25.0,
            ),
            max_overlap_ratio: unit(self.max_overlap_ratio, 0.5),
            search_radius_km: positive(self.search_radius_km, 0.5),
        }
    }
}

/// Auto-accept policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoAcceptConfig {
    /// Default: high confidence only, threshold 0.7
    pub strategy: AutoAcceptStrategy,
    /// Places in these categories are rejected outright.
    pub disabled_categories: Vec<PlaceCategory>,
    /// Places in these categories always go to review.
    pub always_review_categories: Vec<PlaceCategory>,
    /// Below this confidence `AfterNVisits` never auto-accepts.
    /// Default: 0.3
    pub min_confidence_floor: f64,
}

impl Default for AutoAcceptConfig {
    fn default() -> Self {
        Self {
            strategy: AutoAcceptStrategy::HighConfidenceOnly { threshold: 0.7 },
            disabled_categories: Vec::new(),
            always_review_categories: Vec::new(),
            min_confidence_floor: 0.3,
        }
    }
}

impl AutoAcceptConfig {
    pub fn sanitized(&self) -> Self {
        Self {
            strategy: self.strategy.sanitized(),
            disabled_categories: self.disabled_categories.clone(),
            always_review_categories: self.always_review_categories.clone(),
            min_confidence_floor: unit(self.min_confidence_floor, 0.3),
        }
    }
}

/// Complete configuration for a detection pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub quality: QualityFilterConfig,
    pub cluster: ClusterConfig,
    pub sessions: SessionConfig,
    pub scorer: ScorerConfig,
    pub confidence: ConfidenceConfig,
    pub duplicates: DuplicateConfig,
    pub auto_accept: AutoAcceptConfig,

    /// Upper bound on samples consumed per pass; the most recent are kept.
    /// Default: 5000
    pub max_samples_per_pass: usize,

    /// When false every new place is created as Unknown and categorization is
    /// left to user review.
    /// Default: false
    pub auto_categorization_enabled: bool,

    /// Allow re-scoring of places the user has customised or renamed.
    /// Default: false
    pub rescore_user_edited_places: bool,

    /// Attach sessions of duplicate clusters as visits to the existing place.
    /// Default: true
    pub attach_visits_to_existing: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            quality: QualityFilterConfig::default(),
            cluster: ClusterConfig::default(),
            sessions: SessionConfig::default(),
            scorer: ScorerConfig::default(),
            confidence: ConfidenceConfig::default(),
            duplicates: DuplicateConfig::default(),
            auto_accept: AutoAcceptConfig::default(),
            max_samples_per_pass: 5000,
            auto_categorization_enabled: false,
            rescore_user_edited_places: false,
            attach_visits_to_existing: true,
        }
    }
}

impl DetectionConfig {
    /// Clamp every nested value into its valid range.
    pub fn sanitized(&self) -> Self {
        Self {
            quality: self.quality.sanitized(),
            cluster: self.cluster.sanitized(),
            sessions: self.sessions.sanitized(),
            scorer: self.scorer.sanitized(),
            confidence: self.confidence.sanitized(),
            duplicates: self.duplicates.sanitized(),
            auto_accept: self.auto_accept.sanitized(),
            max_samples_per_pass: self.max_samples_per_pass.max(1),
            auto_categorization_enabled: self.auto_categorization_enabled,
            rescore_user_edited_places: self.rescore_user_edited_places,
            attach_visits_to_existing: self.attach_visits_to_existing,
        }
    }
}

fn unit(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        fallback
    }
}

fn non_negative(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        fallback
    }
}

fn positive(value: f64, fallback: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}
