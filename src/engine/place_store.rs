//! Place persistence seam.
//!
//! The detector reads nearby places and writes new or refreshed places
//! through [`PlaceStore`]. [`InMemoryPlaceStore`] keeps place centres in an
//! R-tree so radius lookups stay cheap as the place set grows.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use rstar::{AABB, RTree, RTreeObject};
use uuid::Uuid;

use crate::geo_utils::{haversine_distance, search_boxes};
use crate::{GpsPoint, OptionExt, Place, PlaceMatchError, Result, Visit};

/// Storage for places and their visits.
pub trait PlaceStore: Send + Sync {
    /// Places whose centre lies within `radius_km` of the given point.
    fn places_near(&self, latitude: f64, longitude: f64, radius_km: f64) -> Result<Vec<Place>>;

    /// Insert a new place together with its visits, atomically.
    fn insert_place(&self, place: &Place, visits: &[Visit]) -> Result<()>;

    /// Refresh an existing place and append new visits to it, atomically.
    ///
    /// `place` is the detector's view of the row as read during planning. The
    /// stored name, custom category and user-edit flags always win. If the
    /// stored row gained a user-edit flag that `place` lacks, the user edited
    /// it after the read and the stored category and confidence win too.
    fn update_place(&self, place: &Place, new_visits: &[Visit]) -> Result<()>;
}

/// Place centre wrapper for R-tree indexing.
#[derive(Debug, Clone, PartialEq)]
struct PlaceCenter {
    place_id: Uuid,
    lat: f64,
    lng: f64,
}

impl PlaceCenter {
    fn of(place: &Place) -> Self {
        Self {
            place_id: place.id,
            lat: place.latitude,
            lng: place.longitude,
        }
    }
}

impl RTreeObject for PlaceCenter {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lng, self.lat])
    }
}

#[derive(Debug, Default)]
struct StoreState {
    places: HashMap<Uuid, Place>,
    visits: HashMap<Uuid, Vec<Visit>>,
    index: RTree<PlaceCenter>,
}

/// Thread-safe in-memory place store.
#[derive(Debug, Default)]
pub struct InMemoryPlaceStore {
    state: Mutex<StoreState>,
}

impl InMemoryPlaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with places that have no visits.
    pub fn with_places(places: impl IntoIterator<Item = Place>) -> Self {
        let places: HashMap<Uuid, Place> = places.into_iter().map(|p| (p.id, p)).collect();
        let index = RTree::bulk_load(places.values().map(PlaceCenter::of).collect());
        Self {
            state: Mutex::new(StoreState {
                places,
                visits: HashMap::new(),
                index,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, place_id: &Uuid) -> Option<Place> {
        self.lock().places.get(place_id).cloned()
    }

    /// Overwrite a stored place with a user edit, keeping its visits.
    pub fn apply_user_edit(&self, place: Place) -> Result<()> {
        let mut state = self.lock();
        let previous = state.places.get(&place.id).cloned().ok_or_place_missing(&place.id)?;
        if previous.center() != place.center() {
            state.index.remove(&PlaceCenter::of(&previous));
            state.index.insert(PlaceCenter::of(&place));
        }
        state.places.insert(place.id, place);
        Ok(())
    }

    /// All places, ordered by id.
    pub fn places(&self) -> Vec<Place> {
        let mut places: Vec<Place> = self.lock().places.values().cloned().collect();
        places.sort_by_key(|p| p.id);
        places
    }

    /// Visits of one place in entry order.
    pub fn visits_for(&self, place_id: &Uuid) -> Vec<Visit> {
        let mut visits = self
            .lock()
            .visits
            .get(place_id)
            .cloned()
            .unwrap_or_default();
        visits.sort_by_key(|v| v.entry_time);
        visits
    }

    pub fn visit_count(&self) -> usize {
        self.lock().visits.values().map(Vec::len).sum()
    }

    pub fn len(&self) -> usize {
        self.lock().places.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().places.is_empty()
    }
}

fn check_visits(place: &Place, visits: &[Visit]) -> Result<()> {
    match visits.iter().find(|v| v.place_id != place.id) {
        Some(orphan) => Err(PlaceMatchError::store(
            "write_visits",
            format!("visit {} does not belong to place {}", orphan.id, place.id),
        )),
        None => Ok(()),
    }
}

/// Apply a detector refresh on top of the stored row.
fn merge_refresh(stored: &Place, refreshed: &Place) -> Place {
    let edited_since_read = (stored.is_custom && !refreshed.is_custom)
        || (stored.is_user_renamed && !refreshed.is_user_renamed);

    let mut merged = refreshed.clone();
    merged.name = stored.name.clone();
    merged.custom_category_name = stored.custom_category_name.clone();
    merged.is_custom = stored.is_custom;
    merged.is_user_renamed = stored.is_user_renamed;
    if edited_since_read {
        merged.category = stored.category;
        merged.confidence = stored.confidence;
    }
    merged
}

impl PlaceStore for InMemoryPlaceStore {
    fn places_near(&self, latitude: f64, longitude: f64, radius_km: f64) -> Result<Vec<Place>> {
        let center = GpsPoint::new(latitude, longitude);
        let radius_m = radius_km.max(0.0) * 1000.0;
        let boxes = search_boxes(&center, radius_m);

        let state = self.lock();
        let mut ids: Vec<Uuid> = boxes
            .iter()
            .flat_map(|b| {
                let envelope =
                    AABB::from_corners([b.min_lng, b.min_lat], [b.max_lng, b.max_lat]);
                state
                    .index
                    .locate_in_envelope_intersecting(&envelope)
                    .map(|c| c.place_id)
                    .collect::<Vec<_>>()
            })
            .collect();
        ids.sort_unstable();
        ids.dedup();

        let mut found: Vec<(f64, Place)> = ids
            .iter()
            .filter_map(|id| state.places.get(id))
            .map(|p| (haversine_distance(&center, &p.center()), p))
            .filter(|(d, _)| *d <= radius_m)
            .map(|(d, p)| (d, p.clone()))
            .collect();

        found.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.id.cmp(&b.1.id)));
        Ok(found.into_iter().map(|(_, p)| p).collect())
    }

    fn insert_place(&self, place: &Place, visits: &[Visit]) -> Result<()> {
        check_visits(place, visits)?;
        let mut state = self.lock();
        if state.places.contains_key(&place.id) {
            return Err(PlaceMatchError::store(
                "insert_place",
                format!("place {} already exists", place.id),
            ));
        }

        state.index.insert(PlaceCenter::of(place));
        state.places.insert(place.id, place.clone());
        state.visits.insert(place.id, visits.to_vec());
        Ok(())
    }

    fn update_place(&self, place: &Place, new_visits: &[Visit]) -> Result<()> {
        check_visits(place, new_visits)?;
        let mut state = self.lock();
        let previous = state.places.get(&place.id).cloned().ok_or_place_missing(&place.id)?;

        let merged = merge_refresh(&previous, place);
        if previous.center() != merged.center() {
            state.index.remove(&PlaceCenter::of(&previous));
            state.index.insert(PlaceCenter::of(&merged));
        }
        state.places.insert(merged.id, merged);
        state
            .visits
            .entry(place.id)
            .or_default()
            .extend_from_slice(new_visits);
        Ok(())
    }
}
