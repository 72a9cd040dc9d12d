//! Tests for PlaceDetector passes.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;

use placematch::{
    AtomicProgressTracker, AutoAcceptConfig, AutoAcceptStrategy, CancellationToken,
    CategoryLearner, DetectionConfig, DetectionPhase, DetectionProgressCallback,
    EnrichmentSuggestion, GpsPoint, InMemoryPlaceStore, Place, PlaceCategory, PlaceDetector,
    PlaceMatchError, PlaceStore, Result, Visit,
};

use super::support::*;

fn existing_home(confidence: f64) -> Place {
    Place::new("Somewhere", GpsPoint::new(HOME.0 + 0.00004, HOME.1), 30.0, confidence)
}

// ============================================================================
// New places
// ============================================================================

#[test]
fn test_detects_new_places_end_to_end() {
    let store = Arc::new(InMemoryPlaceStore::new());
    let detector = detector(categorizing_config(), store.clone());

    let mut samples = home_night();
    samples.extend(work_day());
    let report = detector.detect(&samples).unwrap();

    assert_eq!(report.new_places.len(), 2);
    // Clusters are seeded in time order: work in the morning, home at night
    assert_eq!(report.new_places[0].place.category, PlaceCategory::Work);
    assert_eq!(report.new_places[0].place.name, "Work");
    assert_eq!(report.new_places[1].place.category, PlaceCategory::Home);
    assert_eq!(report.new_places[1].place.name, "Home");

    for detected in &report.new_places {
        assert_eq!(detected.visits.len(), 1);
        assert_eq!(detected.place.visit_count, 1);
        assert!((detected.place.confidence - 0.75).abs() < 1e-9);
        assert!(detected.decision.is_accepted());
        assert!(!detected.is_fallback);
    }
    assert_eq!(report.accepted().count(), 2);

    assert_eq!(store.len(), 2);
    assert_eq!(store.visit_count(), 2);
    let home = &report.new_places[1].place;
    assert_eq!(store.get(&home.id).as_ref(), Some(home));

    let review_ids: Vec<_> = report.reviews.iter().map(|r| r.place_id).collect();
    let place_ids: Vec<_> = report.new_places.iter().map(|p| p.place.id).collect();
    assert_eq!(review_ids, place_ids);

    let stats = report.stats;
    assert_eq!(stats.samples_in, 60);
    assert_eq!(stats.samples_kept, 60);
    assert_eq!(stats.clusters, 2);
    assert_eq!(stats.new_places, 2);
    assert_eq!(stats.duplicates, 0);
    assert_eq!(stats.noise_samples, 0);
}

#[test]
fn test_categorization_off_by_default() {
    let store = Arc::new(InMemoryPlaceStore::new());
    let detector = detector(DetectionConfig::default(), store);

    let report = detector.detect(&home_night()).unwrap();
    assert_eq!(report.new_places.len(), 1);
    let place = &report.new_places[0].place;
    assert_eq!(place.category, PlaceCategory::Unknown);
    assert_eq!(place.name, "Unknown Place");
}

#[test]
fn test_empty_batch() {
    let store = Arc::new(InMemoryPlaceStore::new());
    let report = detector(DetectionConfig::default(), store.clone())
        .detect(&[])
        .unwrap();
    assert!(report.new_places.is_empty());
    assert_eq!(report.stats.clusters, 0);
    assert!(store.is_empty());
}

#[test]
fn test_batch_cap_keeps_most_recent() {
    let store = Arc::new(InMemoryPlaceStore::new());
    let config = DetectionConfig {
        max_samples_per_pass: 30,
        ..categorizing_config()
    };
    let mut samples = home_night();
    samples.extend(work_day());

    let report = detector(config, store).detect(&samples).unwrap();
    assert_eq!(report.stats.samples_capped, 30);
    assert_eq!(report.new_places.len(), 1);
    assert_eq!(report.new_places[0].place.category, PlaceCategory::Home);
}

#[test]
fn test_disabled_category_not_committed() {
    let store = Arc::new(InMemoryPlaceStore::new());
    let config = DetectionConfig {
        auto_accept: AutoAcceptConfig {
            disabled_categories: vec![PlaceCategory::Home],
            ..AutoAcceptConfig::default()
        },
        ..categorizing_config()
    };
    let mut samples = home_night();
    samples.extend(work_day());

    let report = detector(config, store.clone()).detect(&samples).unwrap();
    assert_eq!(report.stats.rejected, 1);
    assert_eq!(report.new_places.len(), 1);
    assert_eq!(report.new_places[0].place.category, PlaceCategory::Work);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_learned_preference_changes_decision() {
    let learner = Arc::new(CategoryLearner::new());
    for _ in 0..20 {
        learner.record_rejection(PlaceCategory::Home, 1.0).unwrap();
    }
    let store = Arc::new(InMemoryPlaceStore::new());
    let detector = PlaceDetector::new(categorizing_config(), store, learner);

    let report = detector.detect(&home_night()).unwrap();
    assert_eq!(report.new_places.len(), 1);
    // 0.75 confidence minus the full 0.2 penalty
    assert!(!report.new_places[0].decision.is_accepted());
}

// ============================================================================
// Duplicates
// ============================================================================

#[test]
fn test_rerun_updates_instead_of_duplicating() {
    let store = Arc::new(InMemoryPlaceStore::new());
    let detector = detector(DetectionConfig::default(), store.clone());
    let mut samples = home_night();
    samples.extend(work_day());

    detector.detect(&samples).unwrap();
    let second = detector.detect(&samples).unwrap();

    assert!(second.new_places.is_empty());
    assert_eq!(second.updated_places.len(), 2);
    assert_eq!(second.stats.duplicates, 2);
    assert_eq!(store.len(), 2);
    assert_eq!(store.visit_count(), 4);
    assert!(store.places().iter().all(|p| p.visit_count == 2));
}

#[test]
fn test_refresh_raises_confidence_and_recategorizes() {
    let existing = existing_home(0.3);
    let store = Arc::new(InMemoryPlaceStore::with_places([existing.clone()]));
    let detector = detector(categorizing_config(), store.clone());

    let report = detector.detect(&home_night()).unwrap();
    assert!(report.new_places.is_empty());
    assert_eq!(report.updated_places.len(), 1);

    let update = &report.updated_places[0];
    assert_eq!(update.place.id, existing.id);
    assert_eq!(update.place.name, "Somewhere");
    assert_eq!(update.place.category, PlaceCategory::Home);
    assert!(update.recategorized);
    assert!((update.place.confidence - 0.75).abs() < 1e-9);
    assert_eq!(update.new_visits.len(), 1);

    let stored = store.get(&existing.id).unwrap();
    assert_eq!(stored.visit_count, 1);
    assert_eq!(store.visits_for(&existing.id).len(), 1);
}

#[test]
fn test_refresh_never_lowers_confidence() {
    let existing = existing_home(0.85);
    let store = Arc::new(InMemoryPlaceStore::with_places([existing.clone()]));
    let report = detector(DetectionConfig::default(), store)
        .detect(&home_night())
        .unwrap();
    assert_eq!(report.updated_places[0].place.confidence, 0.85);
}

#[test]
fn test_user_edited_place_is_left_alone() {
    let mut existing = existing_home(0.3);
    existing.is_user_renamed = true;
    let store = Arc::new(InMemoryPlaceStore::with_places([existing.clone()]));

    let report = detector(categorizing_config(), store.clone())
        .detect(&home_night())
        .unwrap();
    let update = &report.updated_places[0];
    assert_eq!(update.place.category, PlaceCategory::Unknown);
    assert!(!update.recategorized);
    assert_eq!(update.place.confidence, 0.3);
    // Visits are still recorded
    assert_eq!(store.visits_for(&existing.id).len(), 1);
}

#[test]
fn test_rescore_user_edited_when_enabled() {
    let mut existing = existing_home(0.3);
    existing.is_custom = true;
    let store = Arc::new(InMemoryPlaceStore::with_places([existing]));
    let config = DetectionConfig {
        rescore_user_edited_places: true,
        ..categorizing_config()
    };

    let report = detector(config, store).detect(&home_night()).unwrap();
    let update = &report.updated_places[0];
    assert_eq!(update.place.category, PlaceCategory::Home);
    assert!(update.recategorized);
    assert_eq!(update.place.confidence, 0.3);
}

#[test]
fn test_attaching_visits_can_be_disabled() {
    let existing = existing_home(0.5);
    let store = Arc::new(InMemoryPlaceStore::with_places([existing.clone()]));
    let config = DetectionConfig {
        attach_visits_to_existing: false,
        ..DetectionConfig::default()
    };

    let report = detector(config, store.clone()).detect(&home_night()).unwrap();
    assert!(report.updated_places[0].new_visits.is_empty());
    assert_eq!(store.get(&existing.id).unwrap().visit_count, 0);
    assert!(store.visits_for(&existing.id).is_empty());
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_insert_failure_writes_fallback_place() {
    let store = Arc::new(FaultyPlaceStore::default());
    store.fail_inserts_with_visits.store(true, Ordering::SeqCst);
    let detector = PlaceDetector::new(
        categorizing_config(),
        store.clone(),
        Arc::new(CategoryLearner::new()),
    );

    let report = detector.detect(&home_night()).unwrap();
    assert_eq!(report.new_places.len(), 1);
    assert_eq!(report.stats.fallback_places, 1);
    assert_eq!(report.stats.failed_writes, 0);

    let fallback = &report.new_places[0];
    assert!(fallback.is_fallback);
    assert!(fallback.visits.is_empty());
    assert_eq!(fallback.place.name, "Unknown Place");
    assert_eq!(fallback.place.category, PlaceCategory::Unknown);
    assert_eq!(fallback.place.visit_count, 0);
    assert!((fallback.place.confidence - 0.75).abs() < 1e-9);

    assert_eq!(store.inner.len(), 1);
    assert_eq!(store.inner.visit_count(), 0);
    assert_eq!(report.reviews.len(), 1);
}

#[test]
fn test_fallback_in_disabled_category_not_committed() {
    let store = Arc::new(FaultyPlaceStore::default());
    store.fail_inserts_with_visits.store(true, Ordering::SeqCst);
    let config = DetectionConfig {
        auto_accept: AutoAcceptConfig {
            disabled_categories: vec![PlaceCategory::Unknown],
            ..AutoAcceptConfig::default()
        },
        ..categorizing_config()
    };
    let detector = PlaceDetector::new(config, store.clone(), Arc::new(CategoryLearner::new()));

    let report = detector.detect(&home_night()).unwrap();
    assert!(report.new_places.is_empty());
    assert!(report.reviews.is_empty());
    assert_eq!(report.stats.rejected, 1);
    assert_eq!(report.stats.fallback_places, 0);
    assert_eq!(report.stats.failed_writes, 0);
    assert!(store.inner.is_empty());
}

#[test]
fn test_failed_fallback_does_not_abort_pass() {
    let store = Arc::new(FaultyPlaceStore::default());
    store.fail_all_inserts.store(true, Ordering::SeqCst);
    let detector = PlaceDetector::new(
        DetectionConfig::default(),
        store.clone(),
        Arc::new(CategoryLearner::new()),
    );

    let mut samples = home_night();
    samples.extend(work_day());
    let report = detector.detect(&samples).unwrap();
    assert!(report.new_places.is_empty());
    assert!(report.reviews.is_empty());
    assert_eq!(report.stats.failed_writes, 2);
    assert!(store.inner.is_empty());
}

#[test]
fn test_lookup_failure_skips_cluster() {
    let store = Arc::new(FaultyPlaceStore::default());
    store.fail_lookups.store(true, Ordering::SeqCst);
    let detector = PlaceDetector::new(
        DetectionConfig::default(),
        store.clone(),
        Arc::new(CategoryLearner::new()),
    );

    let report = detector.detect(&home_night()).unwrap();
    assert_eq!(report.stats.clusters, 1);
    assert_eq!(report.stats.lookup_failures, 1);
    assert!(report.new_places.is_empty());
    assert!(store.inner.is_empty());
}

// ============================================================================
// Cancellation and single flight
// ============================================================================

#[test]
fn test_cancelled_before_start_writes_nothing() {
    let store = Arc::new(InMemoryPlaceStore::new());
    let detector = detector(DetectionConfig::default(), store.clone());
    let token = CancellationToken::new();
    token.cancel();

    let err = detector.detect_with_cancel(&home_night(), &token).unwrap_err();
    assert!(matches!(err, PlaceMatchError::Cancelled { clusters_planned: 0 }));
    assert!(store.is_empty());
    assert!(!detector.is_running());

    // The detector is usable again
    assert_eq!(detector.detect(&home_night()).unwrap().new_places.len(), 1);
}

/// Cancels the token as soon as the first cluster is being planned.
struct CancelWhilePlanning {
    token: CancellationToken,
    phase: Mutex<Option<DetectionPhase>>,
}

impl DetectionProgressCallback for CancelWhilePlanning {
    fn on_phase(&self, phase: DetectionPhase, _total: u32) {
        *self.phase.lock().unwrap() = Some(phase);
    }

    fn on_progress(&self) {
        if *self.phase.lock().unwrap() == Some(DetectionPhase::Planning) {
            self.token.cancel();
        }
    }
}

#[test]
fn test_cancelled_mid_planning_writes_nothing() {
    let token = CancellationToken::new();
    let store = Arc::new(InMemoryPlaceStore::new());
    let detector = detector(DetectionConfig::default(), store.clone()).with_progress(Arc::new(
        CancelWhilePlanning {
            token: token.clone(),
            phase: Mutex::new(None),
        },
    ));

    let mut samples = home_night();
    samples.extend(work_day());
    let err = detector.detect_with_cancel(&samples, &token).unwrap_err();
    assert!(matches!(err, PlaceMatchError::Cancelled { clusters_planned: 1 }));
    assert!(store.is_empty());
}

/// Store whose lookups block until the test releases them.
struct GateStore {
    inner: InMemoryPlaceStore,
    entered: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl PlaceStore for GateStore {
    fn places_near(&self, latitude: f64, longitude: f64, radius_km: f64) -> Result<Vec<Place>> {
        let _ = self.entered.lock().unwrap().send(());
        let _ = self.release.lock().unwrap().recv();
        self.inner.places_near(latitude, longitude, radius_km)
    }

    fn insert_place(&self, place: &Place, visits: &[Visit]) -> Result<()> {
        self.inner.insert_place(place, visits)
    }

    fn update_place(&self, place: &Place, new_visits: &[Visit]) -> Result<()> {
        self.inner.update_place(place, new_visits)
    }
}

#[test]
fn test_concurrent_pass_rejected() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let store = Arc::new(GateStore {
        inner: InMemoryPlaceStore::new(),
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    });
    let detector = Arc::new(PlaceDetector::new(
        DetectionConfig::default(),
        store.clone(),
        Arc::new(CategoryLearner::new()),
    ));

    let worker = {
        let detector = Arc::clone(&detector);
        thread::spawn(move || detector.detect(&home_night()))
    };

    entered_rx.recv().unwrap();
    assert!(detector.is_running());
    assert!(matches!(
        detector.detect(&home_night()),
        Err(PlaceMatchError::AlreadyRunning)
    ));

    release_tx.send(()).unwrap();
    drop(release_tx);
    let report = worker.join().unwrap().unwrap();
    assert_eq!(report.new_places.len(), 1);
    assert!(!detector.is_running());
    assert_eq!(store.inner.len(), 1);
}

// ============================================================================
// Enrichment and progress
// ============================================================================

#[test]
fn test_enrichment_names_place_and_lifts_confidence() {
    let config = DetectionConfig {
        auto_accept: AutoAcceptConfig {
            strategy: AutoAcceptStrategy::HighConfidenceOnly { threshold: 0.8 },
            ..AutoAcceptConfig::default()
        },
        ..categorizing_config()
    };

    let plain = detector(config.clone(), Arc::new(InMemoryPlaceStore::new()))
        .detect(&home_night())
        .unwrap();
    assert!(!plain.new_places[0].decision.is_accepted());
    assert_eq!(plain.new_places[0].suggested_category, None);

    let enriched = detector(config, Arc::new(InMemoryPlaceStore::new()))
        .with_enrichment(Arc::new(|_: &GpsPoint| {
            Some(EnrichmentSuggestion {
                category: Some(PlaceCategory::Home),
                name: Some("  Maple Street  ".to_string()),
            })
        }))
        .detect(&home_night())
        .unwrap();
    let detected = &enriched.new_places[0];
    assert_eq!(detected.place.name, "Maple Street");
    assert_eq!(detected.place.category, PlaceCategory::Home);
    assert_eq!(detected.suggested_category, Some(PlaceCategory::Home));
    assert!(detected.decision.is_accepted());
}

#[test]
fn test_blank_enrichment_name_falls_back_to_category() {
    let report = detector(categorizing_config(), Arc::new(InMemoryPlaceStore::new()))
        .with_enrichment(Arc::new(|_: &GpsPoint| {
            Some(EnrichmentSuggestion {
                category: None,
                name: Some("   ".to_string()),
            })
        }))
        .detect(&work_day())
        .unwrap();
    assert_eq!(report.new_places[0].place.name, "Work");
}

#[test]
fn test_progress_reaches_commit() {
    let tracker = Arc::new(AtomicProgressTracker::new());
    let detector = detector(DetectionConfig::default(), Arc::new(InMemoryPlaceStore::new()))
        .with_progress(tracker.clone());

    let mut samples = home_night();
    samples.extend(work_day());
    detector.detect(&samples).unwrap();

    assert_eq!(tracker.current_phase(), Some(DetectionPhase::Committing));
    assert_eq!(tracker.total.load(Ordering::SeqCst), 2);
    assert_eq!(tracker.completed.load(Ordering::SeqCst), 2);
}

#[test]
fn test_report_json_shape() {
    let report = detector(DetectionConfig::default(), Arc::new(InMemoryPlaceStore::new()))
        .detect(&home_night())
        .unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["stats"]["samplesIn"], 30);
    assert_eq!(json["newPlaces"][0]["isFallback"], false);
    assert_eq!(json["newPlaces"][0]["decision"]["decision"], "auto_accept");
}
