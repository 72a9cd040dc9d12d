//! Tests for the in-memory collaborators and small engine types.

use chrono::Utc;
use placematch::engine::suggest_name;
use placematch::{
    CancellationToken, CategoryEnrichment, CategoryPreference, CorrectionQueue,
    DetectionPhase, EnrichmentSuggestion, GpsPoint, InMemoryCorrectionQueue,
    InMemoryPreferenceStore, PlaceCategory, PreferenceStore, UserCorrection,
};
use uuid::Uuid;

#[test]
fn test_correction_queue_lifecycle() {
    let queue = InMemoryCorrectionQueue::new();
    let first = UserCorrection::new("home", "work", 0.8);
    let second = UserCorrection::new("gym", "park", 0.4);
    queue.push(first.clone());
    queue.push(second.clone());
    assert_eq!(queue.pending_count(), 2);

    queue.mark_applied(first.id).unwrap();
    let pending = queue.unapplied().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, second.id);
    assert_eq!(queue.all().len(), 2);

    assert!(queue.mark_applied(Uuid::new_v4()).is_err());
}

#[test]
fn test_preference_store_round_trip() {
    let store = InMemoryPreferenceStore::new();
    let mut pref = CategoryPreference::new(PlaceCategory::Gym, Utc::now());
    store.save(&pref).unwrap();

    pref.preference_score = 0.4;
    store.save(&pref).unwrap();
    assert_eq!(store.len(), 1);
    assert_eq!(store.get(PlaceCategory::Gym).unwrap().preference_score, 0.4);

    store
        .save(&CategoryPreference::new(PlaceCategory::Home, Utc::now()))
        .unwrap();
    let categories: Vec<PlaceCategory> =
        store.load_all().unwrap().iter().map(|p| p.category).collect();
    assert_eq!(categories, vec![PlaceCategory::Home, PlaceCategory::Gym]);

    store.clear().unwrap();
    assert!(store.is_empty());
}

#[test]
fn test_suggest_name() {
    let named = EnrichmentSuggestion {
        category: None,
        name: Some(" Blue Bottle ".to_string()),
    };
    assert_eq!(suggest_name(PlaceCategory::Cafe, Some(&named)), "Blue Bottle");
    assert_eq!(suggest_name(PlaceCategory::Education, None), "School");
    assert_eq!(
        suggest_name(PlaceCategory::Unknown, Some(&EnrichmentSuggestion::default())),
        "Unknown Place"
    );
}

#[test]
fn test_closure_enrichment() {
    let lookup = |center: &GpsPoint| {
        (center.latitude > 0.0).then(|| EnrichmentSuggestion {
            category: Some(PlaceCategory::Park),
            name: None,
        })
    };
    assert!(lookup.suggest(&GpsPoint::new(-1.0, 0.0)).is_none());
    assert_eq!(
        lookup.suggest(&GpsPoint::new(1.0, 0.0)).unwrap().category,
        Some(PlaceCategory::Park)
    );
}

#[test]
fn test_cancellation_token_shared_between_clones() {
    let token = CancellationToken::new();
    let handle = token.clone();
    assert!(!token.is_cancelled());
    handle.cancel();
    assert!(token.is_cancelled());
}

#[test]
fn test_detection_phase_names() {
    assert_eq!(DetectionPhase::Filtering.as_str(), "filtering");
    assert_eq!(DetectionPhase::Committing.as_str(), "committing");
}
