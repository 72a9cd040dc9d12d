//! Synthetic GPS data generator for stress testing and benchmarking.
//!
//! Generates realistic multi-day sample streams with known dwell places
//! (home nights, office days, gym sessions, shopping trips), providing
//! ground truth for validation of place detection and categorization.
//!
//! Feature-gated behind `synthetic`, not included in production builds.
//!
//! # Example
//!
//! ```rust
//! use placematch::synthetic::SyntheticScenario;
//!
//! let dataset = SyntheticScenario::standard_week().generate();
//! assert_eq!(dataset.expected_places.len(), 3);
//! assert!(!dataset.samples.is_empty());
//! ```

use std::f64::consts::PI;

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::geo_utils::meters_to_degrees;
use crate::{ActivityLabel, GpsPoint, LocationSample, PlaceCategory};

// ============================================================================
// Types
// ============================================================================

/// When the user dwells at a place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DwellPattern {
    /// Every night, 22:00 to 07:00.
    HomeNights,
    /// Weekdays, 09:00 to 17:00.
    OfficeDays,
    /// Monday, Wednesday and Friday, 18:00 to 19:15.
    GymSessions,
    /// Saturdays, 11:00 to 11:40.
    ShoppingTrips,
}

impl DwellPattern {
    /// Category a correct categorizer should assign.
    pub fn expected_category(&self) -> PlaceCategory {
        match self {
            DwellPattern::HomeNights => PlaceCategory::Home,
            DwellPattern::OfficeDays => PlaceCategory::Work,
            DwellPattern::GymSessions => PlaceCategory::Gym,
            DwellPattern::ShoppingTrips => PlaceCategory::Shopping,
        }
    }

    /// Dwell window starting on `day` as (start, minutes).
    fn window(&self, day: DateTime<Utc>) -> Option<(DateTime<Utc>, i64)> {
        let weekday = day.weekday();
        match self {
            DwellPattern::HomeNights => Some((day + Duration::hours(22), 9 * 60)),
            DwellPattern::OfficeDays => match weekday {
                Weekday::Sat | Weekday::Sun => None,
                _ => Some((day + Duration::hours(9), 8 * 60)),
            },
            DwellPattern::GymSessions => match weekday {
                Weekday::Mon | Weekday::Wed | Weekday::Fri => Some((day + Duration::hours(18), 75)),
                _ => None,
            },
            DwellPattern::ShoppingTrips => match weekday {
                Weekday::Sat => Some((day + Duration::hours(11), 40)),
                _ => None,
            },
        }
    }
}

/// A dwell place placed relative to the scenario origin.
#[derive(Debug, Clone)]
pub struct DwellConfig {
    pub name: String,
    pub pattern: DwellPattern,
    /// Offset from the origin in meters (east, north).
    pub offset_meters: (f64, f64),
}

/// Ground truth for one generated place.
#[derive(Debug, Clone)]
pub struct ExpectedPlace {
    pub name: String,
    pub center: GpsPoint,
    pub category: PlaceCategory,
    /// Number of dwell windows generated.
    pub visits: usize,
}

/// Metadata about a generated dataset.
#[derive(Debug, Clone)]
pub struct DatasetMetadata {
    pub total_samples: usize,
    /// Samples emitted while driving between places.
    pub travel_samples: usize,
    pub days: u32,
}

/// A complete synthetic dataset with ground truth.
pub struct SyntheticDataset {
    /// Samples in time order.
    pub samples: Vec<LocationSample>,
    pub expected_places: Vec<ExpectedPlace>,
    pub metadata: DatasetMetadata,
}

/// Scenario configuration for generating synthetic data.
#[derive(Debug, Clone)]
pub struct SyntheticScenario {
    pub origin: GpsPoint,
    /// Midnight UTC of the first generated day.
    pub start: DateTime<Utc>,
    pub days: u32,
    pub places: Vec<DwellConfig>,
    /// Minutes between consecutive dwell samples.
    pub sample_interval_minutes: i64,
    /// GPS noise standard deviation in meters.
    pub gps_noise_sigma_meters: f64,
    /// Reported accuracy range in meters.
    pub accuracy_range: (f64, f64),
    /// Driving samples emitted between consecutive dwells.
    pub travel_samples_per_trip: usize,
    /// RNG seed for deterministic reproduction.
    pub seed: u64,
}

// ============================================================================
// Coordinate Helpers
// ============================================================================

fn offset_point(origin: &GpsPoint, east_meters: f64, north_meters: f64) -> GpsPoint {
    GpsPoint::new(
        origin.latitude + meters_to_degrees(north_meters, 0.0),
        origin.longitude + meters_to_degrees(east_meters, origin.latitude),
    )
}

/// Gaussian GPS noise around a point (Box-Muller).
fn add_gps_noise(point: &GpsPoint, sigma_meters: f64, rng: &mut StdRng) -> GpsPoint {
    if sigma_meters <= 0.0 {
        return *point;
    }
    let u1: f64 = rng.gen_range(0.0001..1.0);
    let u2: f64 = rng.r#gen();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
    let z1 = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).sin();
    offset_point(point, z1 * sigma_meters, z0 * sigma_meters)
}

// ============================================================================
// Scenario Implementation
// ============================================================================

struct Dwell {
    place_idx: usize,
    start: DateTime<Utc>,
    minutes: i64,
}

impl SyntheticScenario {
    /// Generate a complete synthetic dataset from this scenario.
    pub fn generate(&self) -> SyntheticDataset {
        let mut rng = StdRng::seed_from_u64(self.seed);

        let centers: Vec<GpsPoint> = self
            .places
            .iter()
            .map(|p| offset_point(&self.origin, p.offset_meters.0, p.offset_meters.1))
            .collect();

        let mut dwells: Vec<Dwell> = Vec::new();
        for day_idx in 0..self.days {
            let day = self.start + Duration::days(day_idx as i64);
            for (place_idx, place) in self.places.iter().enumerate() {
                if let Some((start, minutes)) = place.pattern.window(day) {
                    dwells.push(Dwell {
                        place_idx,
                        start,
                        minutes,
                    });
                }
            }
        }
        dwells.sort_by_key(|d| d.start);

        let interval = self.sample_interval_minutes.max(1);
        let (min_acc, max_acc) = self.accuracy_range;
        let mut samples = Vec::new();
        let mut travel_samples = 0usize;
        let mut visits = vec![0usize; self.places.len()];
        let mut previous: Option<(GpsPoint, DateTime<Utc>)> = None;

        for dwell in &dwells {
            let center = centers[dwell.place_idx];

            // Driving samples between the previous dwell and this one
            if let Some((from, left_at)) = previous {
                let gap = dwell.start - left_at;
                let trip = (self.travel_samples_per_trip + 1) as i32;
                for step in 1..trip {
                    let fraction = step as f64 / trip as f64;
                    let point = GpsPoint::new(
                        from.latitude + (center.latitude - from.latitude) * fraction,
                        from.longitude + (center.longitude - from.longitude) * fraction,
                    );
                    samples.push(
                        LocationSample::new(
                            point.latitude,
                            point.longitude,
                            left_at + gap * step / trip,
                            rng.gen_range(min_acc..=max_acc),
                        )
                        .with_speed(rng.gen_range(30.0..60.0))
                        .with_activity(ActivityLabel::Driving, rng.gen_range(0.8..1.0)),
                    );
                    travel_samples += 1;
                }
            }

            let mut minute = 0;
            while minute < dwell.minutes {
                let point = add_gps_noise(&center, self.gps_noise_sigma_meters, &mut rng);
                samples.push(
                    LocationSample::new(
                        point.latitude,
                        point.longitude,
                        dwell.start + Duration::minutes(minute),
                        rng.gen_range(min_acc..=max_acc),
                    )
                    .with_activity(ActivityLabel::Stationary, rng.gen_range(0.6..1.0)),
                );
                minute += interval;
            }
            visits[dwell.place_idx] += 1;
            previous = Some((center, dwell.start + Duration::minutes(dwell.minutes)));
        }

        let expected_places = self
            .places
            .iter()
            .zip(centers)
            .zip(visits)
            .filter(|(_, count)| *count > 0)
            .map(|((place, center), count)| ExpectedPlace {
                name: place.name.clone(),
                center,
                category: place.pattern.expected_category(),
                visits: count,
            })
            .collect();

        SyntheticDataset {
            metadata: DatasetMetadata {
                total_samples: samples.len(),
                travel_samples,
                days: self.days,
            },
            samples,
            expected_places,
        }
    }
}

// ============================================================================
// Preset Scenarios
// ============================================================================

/// Zurich, Switzerland: default origin for all presets.
const ZURICH: GpsPoint = GpsPoint {
    latitude: 47.37,
    longitude: 8.55,
};

fn first_monday() -> DateTime<Utc> {
    // 2024-03-04 is a Monday
    Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

fn dwell(name: &str, pattern: DwellPattern, east: f64, north: f64) -> DwellConfig {
    DwellConfig {
        name: name.to_string(),
        pattern,
        offset_meters: (east, north),
    }
}

impl SyntheticScenario {
    /// Two weeks with home, office and gym. Baseline benchmark.
    pub fn standard_week() -> Self {
        Self {
            origin: ZURICH,
            start: first_monday(),
            days: 14,
            places: vec![
                dwell("Home", DwellPattern::HomeNights, 0.0, 0.0),
                dwell("Office", DwellPattern::OfficeDays, 3_000.0, 1_500.0),
                dwell("Gym", DwellPattern::GymSessions, -1_200.0, 800.0),
            ],
            sample_interval_minutes: 10,
            gps_noise_sigma_meters: 4.0,
            accuracy_range: (5.0, 15.0),
            travel_samples_per_trip: 3,
            seed: 42,
        }
    }

    /// Home only, for a given number of nights.
    pub fn home_only(days: u32) -> Self {
        Self {
            days,
            places: vec![dwell("Home", DwellPattern::HomeNights, 0.0, 0.0)],
            seed: 7,
            ..Self::standard_week()
        }
    }

    /// Four weeks with all dwell patterns and denser sampling.
    ///
    /// Large enough to hit the per-pass sample cap.
    pub fn busy_month() -> Self {
        Self {
            days: 28,
            places: vec![
                dwell("Home", DwellPattern::HomeNights, 0.0, 0.0),
                dwell("Office", DwellPattern::OfficeDays, 3_000.0, 1_500.0),
                dwell("Gym", DwellPattern::GymSessions, -1_200.0, 800.0),
                dwell("Market", DwellPattern::ShoppingTrips, 600.0, -2_000.0),
            ],
            sample_interval_minutes: 5,
            seed: 43,
            ..Self::standard_week()
        }
    }
}
