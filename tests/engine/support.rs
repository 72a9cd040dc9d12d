//! Shared fixtures for engine tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Duration, TimeZone, Utc};
use placematch::{
    CategoryLearner, DetectionConfig, InMemoryPlaceStore, LocationSample, Place, PlaceDetector,
    PlaceMatchError, PlaceStore, Result, Visit,
};

pub const HOME: (f64, f64) = (47.37, 8.55);
pub const WORK: (f64, f64) = (47.38, 8.56);

/// Monday 2024-03-04 at the given hour.
pub fn monday_at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, hour, 0, 0).unwrap()
}

/// `count` samples three minutes apart, scattered within ~10 m of `at`.
pub fn dwell(at: (f64, f64), start: DateTime<Utc>, count: usize) -> Vec<LocationSample> {
    (0..count)
        .map(|i| {
            LocationSample::new(
                at.0 + (i % 5) as f64 * 0.00002,
                at.1 + (i % 3) as f64 * 0.00002,
                start + Duration::minutes(3 * i as i64),
                8.0,
            )
        })
        .collect()
}

/// Thirty night samples at home, Monday 23:00 onwards.
pub fn home_night() -> Vec<LocationSample> {
    dwell(HOME, monday_at(23), 30)
}

/// Thirty office-hour samples at work, Monday 10:00 onwards.
pub fn work_day() -> Vec<LocationSample> {
    dwell(WORK, monday_at(10), 30)
}

pub fn categorizing_config() -> DetectionConfig {
    DetectionConfig {
        auto_categorization_enabled: true,
        ..DetectionConfig::default()
    }
}

pub fn detector(config: DetectionConfig, store: Arc<InMemoryPlaceStore>) -> PlaceDetector {
    PlaceDetector::new(config, store, Arc::new(CategoryLearner::new()))
}

/// Place store with switchable failure modes, backed by an in-memory store.
#[derive(Default)]
pub struct FaultyPlaceStore {
    pub inner: InMemoryPlaceStore,
    pub fail_lookups: AtomicBool,
    /// Reject inserts that carry visits
    pub fail_inserts_with_visits: AtomicBool,
    pub fail_all_inserts: AtomicBool,
}

impl PlaceStore for FaultyPlaceStore {
    fn places_near(&self, latitude: f64, longitude: f64, radius_km: f64) -> Result<Vec<Place>> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(PlaceMatchError::store("places_near", "connection reset"));
        }
        self.inner.places_near(latitude, longitude, radius_km)
    }

    fn insert_place(&self, place: &Place, visits: &[Visit]) -> Result<()> {
        if self.fail_all_inserts.load(Ordering::SeqCst)
            || (self.fail_inserts_with_visits.load(Ordering::SeqCst) && !visits.is_empty())
        {
            return Err(PlaceMatchError::store("insert_place", "constraint violation"));
        }
        self.inner.insert_place(place, visits)
    }

    fn update_place(&self, place: &Place, new_visits: &[Visit]) -> Result<()> {
        self.inner.update_place(place, new_visits)
    }
}
