//! Tests for InMemoryPlaceStore.

use chrono::Duration;
use placematch::{
    GpsPoint, InMemoryPlaceStore, Place, PlaceCategory, PlaceMatchError, PlaceStore, Visit,
};
use uuid::Uuid;

use super::support::monday_at;

fn place_at(lat: f64, lng: f64) -> Place {
    Place::new("Test", GpsPoint::new(lat, lng), 30.0, 0.5)
}

#[test]
fn test_places_near_filters_and_sorts_by_distance() {
    let far = place_at(0.01, 0.0); // ~1.1 km
    let mid = place_at(0.002, 0.0); // ~222 m
    let near = place_at(0.0005, 0.0); // ~56 m
    let store = InMemoryPlaceStore::with_places([far.clone(), mid.clone(), near.clone()]);

    let found = store.places_near(0.0, 0.0, 0.5).unwrap();
    let ids: Vec<Uuid> = found.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![near.id, mid.id]);

    assert_eq!(store.places_near(0.0, 0.0, 2.0).unwrap().len(), 3);
    assert!(store.places_near(0.0, 0.0, 0.0).unwrap().is_empty());
}

#[test]
fn test_places_near_includes_place_near_radius() {
    // A haversine degree is shorter than the flat-earth degree used for the
    // query box, so a place just inside the radius must not be clipped
    let edge = place_at(1.0, 0.0);
    let store = InMemoryPlaceStore::with_places([edge.clone()]);
    let radius_km = placematch::geo_utils::haversine_distance(
        &GpsPoint::new(0.0, 0.0),
        &edge.center(),
    ) / 1000.0
        * 1.000001;

    let found = store.places_near(0.0, 0.0, radius_km).unwrap();
    assert_eq!(found.len(), 1);
}

#[test]
fn test_places_near_across_antimeridian() {
    let east = place_at(0.0, 179.9999); // ~11 m west of the antimeridian
    let west = place_at(0.0, -179.9995); // ~56 m east of it
    let store = InMemoryPlaceStore::with_places([east.clone(), west.clone()]);

    let ids: Vec<Uuid> = store
        .places_near(0.0, -179.9999, 0.1)
        .unwrap()
        .iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(ids, vec![east.id, west.id]);

    let from_east = store.places_near(0.0, 179.9999, 0.1).unwrap();
    assert_eq!(from_east.len(), 2);
    assert_eq!(from_east[0].id, east.id);
}

#[test]
fn test_places_near_pole() {
    let place = place_at(89.99, 90.0);
    let store = InMemoryPlaceStore::with_places([place.clone()]);

    // Across the pole, about 2.2 km away
    let found = store.places_near(89.99, -90.0, 3.0).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, place.id);
    assert!(store.places_near(89.99, -90.0, 1.0).unwrap().is_empty());

    // Same latitude, 1 degree of longitude away: under 200 m here
    assert_eq!(store.places_near(89.99, 91.0, 0.5).unwrap().len(), 1);
}

#[test]
fn test_insert_and_read_back() {
    let store = InMemoryPlaceStore::new();
    assert!(store.is_empty());

    let place = place_at(47.37, 8.55);
    let visits = vec![
        Visit::new(place.id, monday_at(20), Some(monday_at(22))),
        Visit::new(place.id, monday_at(8), Some(monday_at(9))),
    ];
    store.insert_place(&place, &visits).unwrap();

    assert_eq!(store.len(), 1);
    assert_eq!(store.get(&place.id), Some(place.clone()));
    let stored = store.visits_for(&place.id);
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].entry_time, monday_at(8));
    assert_eq!(store.visit_count(), 2);
}

#[test]
fn test_insert_duplicate_id_fails() {
    let store = InMemoryPlaceStore::new();
    let place = place_at(47.37, 8.55);
    store.insert_place(&place, &[]).unwrap();

    let err = store.insert_place(&place, &[]).unwrap_err();
    assert!(matches!(err, PlaceMatchError::Store { .. }));
    assert_eq!(store.len(), 1);
}

#[test]
fn test_insert_rejects_foreign_visits() {
    let store = InMemoryPlaceStore::new();
    let place = place_at(47.37, 8.55);
    let stray = Visit::new(Uuid::new_v4(), monday_at(8), None);

    assert!(store.insert_place(&place, &[stray]).is_err());
    assert!(store.is_empty());
}

#[test]
fn test_update_appends_visits_and_reindexes() {
    let mut place = place_at(47.37, 8.55);
    let store = InMemoryPlaceStore::with_places([place.clone()]);

    place.latitude = 47.40;
    place.visit_count = 1;
    let visit = Visit::new(place.id, monday_at(8), Some(monday_at(8) + Duration::hours(1)));
    store.update_place(&place, &[visit]).unwrap();

    assert_eq!(store.get(&place.id).unwrap().visit_count, 1);
    assert_eq!(store.visits_for(&place.id).len(), 1);
    assert!(store.places_near(47.37, 8.55, 0.5).unwrap().is_empty());
    assert_eq!(store.places_near(47.40, 8.55, 0.5).unwrap().len(), 1);
}

#[test]
fn test_update_keeps_user_edit_made_after_read() {
    let read = place_at(47.37, 8.55);
    let store = InMemoryPlaceStore::with_places([read.clone()]);

    // The user renames and recategorizes while a refresh is in flight
    let mut edited = read.clone();
    edited.name = "Grandma's".to_string();
    edited.category = PlaceCategory::Home;
    edited.custom_category_name = Some("Family".to_string());
    edited.is_custom = true;
    edited.is_user_renamed = true;
    store.apply_user_edit(edited).unwrap();

    let mut refreshed = read.clone();
    refreshed.category = PlaceCategory::Restaurant;
    refreshed.confidence = 0.8;
    refreshed.visit_count = 2;
    let visit = Visit::new(read.id, monday_at(12), Some(monday_at(13)));
    store.update_place(&refreshed, &[visit]).unwrap();

    let stored = store.get(&read.id).unwrap();
    assert_eq!(stored.name, "Grandma's");
    assert_eq!(stored.category, PlaceCategory::Home);
    assert_eq!(stored.custom_category_name.as_deref(), Some("Family"));
    assert!(stored.is_custom && stored.is_user_renamed);
    assert_eq!(stored.confidence, 0.5);
    assert_eq!(stored.visit_count, 2);
    assert_eq!(store.visits_for(&read.id).len(), 1);
}

#[test]
fn test_update_rescores_user_edited_place_seen_at_read() {
    let mut read = place_at(47.37, 8.55);
    read.name = "Corner".to_string();
    read.is_user_renamed = true;
    let store = InMemoryPlaceStore::with_places([read.clone()]);

    let mut refreshed = read.clone();
    refreshed.name = "Ignored".to_string();
    refreshed.category = PlaceCategory::Cafe;
    store.update_place(&refreshed, &[]).unwrap();

    let stored = store.get(&read.id).unwrap();
    assert_eq!(stored.name, "Corner");
    assert_eq!(stored.category, PlaceCategory::Cafe);
}

#[test]
fn test_update_missing_place_fails() {
    let store = InMemoryPlaceStore::new();
    let err = store.update_place(&place_at(0.0, 0.0), &[]).unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[test]
fn test_places_ordered_by_id() {
    let store = InMemoryPlaceStore::with_places((0..5).map(|i| place_at(i as f64, 0.0)));
    let places = store.places();
    assert_eq!(places.len(), 5);
    assert!(places.windows(2).all(|w| w[0].id < w[1].id));
}
