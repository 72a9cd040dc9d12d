//! Category preference persistence seam.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::learning::CategoryPreference;
use crate::{PlaceCategory, Result};

/// Key-value storage for learned category preferences.
pub trait PreferenceStore: Send + Sync {
    fn load_all(&self) -> Result<Vec<CategoryPreference>>;

    /// Insert or replace the row for `preference.category`.
    fn save(&self, preference: &CategoryPreference) -> Result<()>;

    fn clear(&self) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryPreferenceStore {
    rows: Mutex<HashMap<PlaceCategory, CategoryPreference>>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PlaceCategory, CategoryPreference>> {
        self.rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, category: PlaceCategory) -> Option<CategoryPreference> {
        self.lock().get(&category).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl PreferenceStore for InMemoryPreferenceStore {
    fn load_all(&self) -> Result<Vec<CategoryPreference>> {
        let mut rows: Vec<CategoryPreference> = self.lock().values().cloned().collect();
        rows.sort_by_key(|p| p.category);
        Ok(rows)
    }

    fn save(&self, preference: &CategoryPreference) -> Result<()> {
        self.lock().insert(preference.category, preference.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.lock().clear();
        Ok(())
    }
}
