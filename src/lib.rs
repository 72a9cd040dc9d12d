//! # Place Matcher
//!
//! Place detection and adaptive categorization from raw GPS samples.
//!
//! This library provides:
//! - GPS quality filtering (accuracy, impossible speed, jitter)
//! - Density-based clustering (DBSCAN) over haversine distance
//! - Visit session segmentation
//! - Multi-factor, score-based place categorization
//! - Confidence estimation and duplicate suppression
//! - An auto-accept decision engine with a bounded learned bonus
//! - An online category learner driven by user feedback
//!
//! ## Features
//!
//! - **`parallel`** - Compute clustering neighbourhoods with rayon
//! - **`synthetic`** - Seeded synthetic dwell generator for tests and benches
//! - **`cli`** - Debug command line tool
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use placematch::{DetectionConfig, LocationSample, filter_samples, cluster_samples};
//!
//! let start = Utc.with_ymd_and_hms(2024, 3, 4, 23, 0, 0).unwrap();
//! let samples: Vec<LocationSample> = (0..10)
//!     .map(|i| {
//!         LocationSample::new(
//!             40.0 + i as f64 * 0.00002,
//!             -74.0,
//!             start + chrono::Duration::minutes(3 * i),
//!             8.0,
//!         )
//!     })
//!     .collect();
//!
//! let config = DetectionConfig::default();
//! let kept = filter_samples(&samples, &config.quality);
//! let clusters = cluster_samples(&kept, &config.cluster);
//! assert_eq!(clusters.len(), 1);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Unified error handling
pub mod error;
pub use error::{OptionExt, PlaceMatchError, Result};

// Geographic utilities (distance, bounds, bearing)
pub mod geo_utils;

// Configuration value objects
pub mod config;
pub use config::{
    AutoAcceptConfig, ClusterConfig, ConfidenceConfig, DetectionConfig, DuplicateConfig,
    QualityFilterConfig, ScorerConfig, SessionConfig,
};

// GPS quality filtering
pub mod quality;
pub use quality::{FilterStats, filter_samples, filter_samples_with_stats};

// Density clustering
pub mod clustering;
pub use clustering::{
    ClusterCandidate, ClusterStats, cluster_samples, cluster_samples_with_stats, dbscan,
};

// Visit sessions
pub mod sessions;
pub use sessions::{Session, segment_sessions};

// Category scoring and confidence
pub mod categorization;
pub use categorization::{
    CategoryScores, VisitPatterns, categorize, estimate_confidence, score_categories,
    select_category,
};

// Duplicate suppression
pub mod duplicates;
pub use duplicates::{DuplicateAssessment, assess_duplicate};

// Auto-accept decisions
pub mod auto_accept;
pub use auto_accept::{
    AcceptStatus, AutoAcceptDecision, AutoAcceptEngine, AutoAcceptStrategy, RejectReason,
    ReviewPriority, ReviewReason, osm_bonus,
};

// Category learning from user feedback
pub mod learning;
pub use learning::{
    CategoryLearner, CategoryPreference, LearningEvent, ReplaySummary, UserCorrection,
};

// Detection engine and collaborator seams
pub mod engine;
pub use engine::{
    AtomicProgressTracker, CancellationToken, CategoryEnrichment, CorrectionQueue, DetectedPlace,
    DetectionPhase, DetectionProgressCallback, DetectionReport, DetectionStats,
    EnrichmentSuggestion, InMemoryCorrectionQueue, InMemoryPlaceStore, InMemoryPreferenceStore,
    NoopProgress, PlaceDetector, PlaceStore, PlaceUpdate, PreferenceStore, ReviewRecord,
};

// Synthetic data for tests and benchmarks
#[cfg(feature = "synthetic")]
pub mod synthetic;

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use placematch::GpsPoint;
/// let point = GpsPoint::new(40.7128, -74.0060); // New York
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from GPS points.
    pub fn from_points(points: &[GpsPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lng = f64::MAX;
        let mut max_lng = f64::MIN;

        for p in points {
            min_lat = min_lat.min(p.latitude);
            max_lat = max_lat.max(p.latitude);
            min_lng = min_lng.min(p.longitude);
            max_lng = max_lng.max(p.longitude);
        }

        Some(Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        })
    }

    /// Square box of `radius_meters` around a point.
    pub fn around(center: &GpsPoint, radius_meters: f64) -> Self {
        Self {
            min_lat: center.latitude,
            max_lat: center.latitude,
            min_lng: center.longitude,
            max_lng: center.longitude,
        }
        .expand_meters(radius_meters)
    }

    /// Grow the box by a buffer in meters on every side.
    pub fn expand_meters(&self, meters: f64) -> Self {
        let lat_buffer = geo_utils::meters_to_degrees(meters, 0.0);
        let ref_lat = self.min_lat.abs().max(self.max_lat.abs());
        let lng_buffer = geo_utils::meters_to_degrees(meters, ref_lat);
        Self {
            min_lat: self.min_lat - lat_buffer,
            max_lat: self.max_lat + lat_buffer,
            min_lng: self.min_lng - lng_buffer,
            max_lng: self.max_lng + lng_buffer,
        }
    }

    /// Check whether a point lies inside the box (edges inclusive).
    pub fn contains(&self, point: &GpsPoint) -> bool {
        point.latitude >= self.min_lat
            && point.latitude <= self.max_lat
            && point.longitude >= self.min_lng
            && point.longitude <= self.max_lng
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> GpsPoint {
        GpsPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// Motion label supplied by the device activity-recognition subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLabel {
    Stationary,
    Walking,
    Running,
    Cycling,
    Driving,
    Unknown,
}

impl ActivityLabel {
    /// Labels that indicate the device is inside a moving vehicle.
    pub fn is_vehicle(&self) -> bool {
        matches!(self, ActivityLabel::Driving | ActivityLabel::Cycling)
    }
}

/// One raw GPS fix as delivered by the sample source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
    /// Horizontal accuracy radius in meters (lower is better)
    pub accuracy_meters: f64,
    /// Speed reported by the device, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_kmh: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_label: Option<ActivityLabel>,
    /// Confidence of `activity_label` in [0, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_confidence: Option<f64>,
}

impl LocationSample {
    /// Create a sample without speed or activity information.
    pub fn new(
        latitude: f64,
        longitude: f64,
        timestamp: DateTime<Utc>,
        accuracy_meters: f64,
    ) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
            accuracy_meters,
            speed_kmh: None,
            activity_label: None,
            activity_confidence: None,
        }
    }

    /// Attach a device-reported speed.
    pub fn with_speed(mut self, speed_kmh: f64) -> Self {
        self.speed_kmh = Some(speed_kmh);
        self
    }

    /// Attach an activity-recognition label.
    pub fn with_activity(mut self, label: ActivityLabel, confidence: f64) -> Self {
        self.activity_label = Some(label);
        self.activity_confidence = Some(confidence);
        self
    }

    pub fn point(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }

    /// Validate coordinates and accuracy.
    pub fn validate(&self, index: usize) -> Result<()> {
        if !self.point().is_valid() {
            return Err(PlaceMatchError::InvalidSample {
                index,
                reason: format!(
                    "coordinates out of range ({}, {})",
                    self.latitude, self.longitude
                ),
            });
        }
        if !self.accuracy_meters.is_finite() || self.accuracy_meters < 0.0 {
            return Err(PlaceMatchError::InvalidSample {
                index,
                reason: format!("accuracy {} is not a non-negative number", self.accuracy_meters),
            });
        }
        Ok(())
    }
}

/// Semantic category of a place.
///
/// Declaration order doubles as the tie-break order of the category scorer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PlaceCategory {
    Home,
    Work,
    Education,
    Gym,
    Shopping,
    Restaurant,
    Cafe,
    Park,
    Healthcare,
    Entertainment,
    Travel,
    Unknown,
}

impl PlaceCategory {
    pub const ALL: [PlaceCategory; 12] = [
        PlaceCategory::Home,
        PlaceCategory::Work,
        PlaceCategory::Education,
        PlaceCategory::Gym,
        PlaceCategory::Shopping,
        PlaceCategory::Restaurant,
        PlaceCategory::Cafe,
        PlaceCategory::Park,
        PlaceCategory::Healthcare,
        PlaceCategory::Entertainment,
        PlaceCategory::Travel,
        PlaceCategory::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlaceCategory::Home => "home",
            PlaceCategory::Work => "work",
            PlaceCategory::Education => "education",
            PlaceCategory::Gym => "gym",
            PlaceCategory::Shopping => "shopping",
            PlaceCategory::Restaurant => "restaurant",
            PlaceCategory::Cafe => "cafe",
            PlaceCategory::Park => "park",
            PlaceCategory::Healthcare => "healthcare",
            PlaceCategory::Entertainment => "entertainment",
            PlaceCategory::Travel => "travel",
            PlaceCategory::Unknown => "unknown",
        }
    }

    /// Human-readable name used when suggesting a place name.
    pub fn display_name(&self) -> &'static str {
        match self {
            PlaceCategory::Home => "Home",
            PlaceCategory::Work => "Work",
            PlaceCategory::Education => "School",
            PlaceCategory::Gym => "Gym",
            PlaceCategory::Shopping => "Shopping",
            PlaceCategory::Restaurant => "Restaurant",
            PlaceCategory::Cafe => "Cafe",
            PlaceCategory::Park => "Park",
            PlaceCategory::Healthcare => "Healthcare",
            PlaceCategory::Entertainment => "Entertainment",
            PlaceCategory::Travel => "Travel",
            PlaceCategory::Unknown => "Unknown Place",
        }
    }

    /// Affinity group used for partial enrichment matches.
    ///
    /// Categories with no group return a slice containing only themselves.
    pub fn similar_group(&self) -> &'static [PlaceCategory] {
        match self {
            PlaceCategory::Restaurant | PlaceCategory::Cafe => {
                &[PlaceCategory::Restaurant, PlaceCategory::Cafe]
            }
            PlaceCategory::Work | PlaceCategory::Education => {
                &[PlaceCategory::Work, PlaceCategory::Education]
            }
            PlaceCategory::Gym | PlaceCategory::Park => &[PlaceCategory::Gym, PlaceCategory::Park],
            PlaceCategory::Shopping | PlaceCategory::Entertainment => {
                &[PlaceCategory::Shopping, PlaceCategory::Entertainment]
            }
            PlaceCategory::Home => &[PlaceCategory::Home],
            PlaceCategory::Healthcare => &[PlaceCategory::Healthcare],
            PlaceCategory::Travel => &[PlaceCategory::Travel],
            PlaceCategory::Unknown => &[PlaceCategory::Unknown],
        }
    }

    /// Whether two distinct categories share an affinity group.
    pub fn is_similar_to(&self, other: PlaceCategory) -> bool {
        *self != other && self.similar_group().contains(&other)
    }
}

impl std::fmt::Display for PlaceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PlaceCategory {
    type Err = PlaceMatchError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        PlaceCategory::ALL
            .iter()
            .find(|c| c.as_str() == normalized)
            .copied()
            .ok_or_unknown_category(s)
    }
}

/// A place the user visits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    pub id: Uuid,
    pub name: String,
    pub category: PlaceCategory,
    /// Free-form category chosen by the user, overrides `category` for display
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_category_name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    /// Radius in meters
    pub radius: f64,
    pub visit_count: u32,
    pub confidence: f64,
    pub is_custom: bool,
    pub is_user_renamed: bool,
}

impl Place {
    /// Create a detected place with a fresh id and no visits.
    pub fn new(name: impl Into<String>, center: GpsPoint, radius: f64, confidence: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            category: PlaceCategory::Unknown,
            custom_category_name: None,
            latitude: center.latitude,
            longitude: center.longitude,
            radius,
            visit_count: 0,
            confidence,
            is_custom: false,
            is_user_renamed: false,
        }
    }

    pub fn center(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }

    /// Whether the user has taken ownership of this place.
    pub fn is_user_edited(&self) -> bool {
        self.is_custom || self.is_user_renamed
    }
}

/// A stay at a place. `exit_time == None` means the visit is ongoing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub id: Uuid,
    pub place_id: Uuid,
    pub entry_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_time: Option<DateTime<Utc>>,
}

impl Visit {
    pub fn new(place_id: Uuid, entry_time: DateTime<Utc>, exit_time: Option<DateTime<Utc>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            place_id,
            entry_time,
            exit_time,
        }
    }

    pub fn is_open(&self) -> bool {
        self.exit_time.is_none()
    }

    /// Visit duration, measuring open visits up to `now`. Never negative.
    pub fn duration(&self, now: DateTime<Utc>) -> chrono::Duration {
        let end = self.exit_time.unwrap_or(now);
        (end - self.entry_time).max(chrono::Duration::zero())
    }
}
