//! Online category learning from user feedback.
//!
//! Each category carries a preference score in [-1, 1]:
//! - acceptance: `+0.05 × confidence`
//! - rejection: `-0.10 × confidence`
//! - correction: the wrong category gets `-0.15 × confidence`, the
//!   corrected one a fixed `+0.10`
//!
//! The score is clamped after every update and exposed to the auto-accept
//! engine as a bonus of at most ±0.2.
//!
//! All updates go through one learner-wide mutex, so concurrent events for
//! the same category never lose an update. When a [`PreferenceStore`] is
//! attached, the new value is persisted before it becomes visible in memory.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::{CorrectionQueue, PreferenceStore};
use crate::{PlaceCategory, PlaceMatchError, Result};

pub const ACCEPTANCE_RATE: f64 = 0.05;
pub const REJECTION_RATE: f64 = 0.10;
pub const CORRECTION_PENALTY_RATE: f64 = 0.15;
/// Reward for the corrected-to category, independent of detector confidence.
pub const CORRECTION_REWARD: f64 = 0.10;
/// Multiplier turning a preference score into an auto-accept bonus.
pub const BONUS_SCALE: f64 = 0.2;
pub const MAX_BONUS: f64 = 0.2;

/// Learned affinity for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPreference {
    pub category: PlaceCategory,
    /// Always in [-1.0, 1.0]
    pub preference_score: f64,
    pub acceptance_count: u32,
    pub rejection_count: u32,
    pub correction_count: u32,
    pub last_updated: DateTime<Utc>,
}

impl CategoryPreference {
    pub fn new(category: PlaceCategory, now: DateTime<Utc>) -> Self {
        Self {
            category,
            preference_score: 0.0,
            acceptance_count: 0,
            rejection_count: 0,
            correction_count: 0,
            last_updated: now,
        }
    }

    /// Share of accept/reject decisions that were acceptances.
    pub fn acceptance_rate(&self) -> Option<f64> {
        let decided = self.acceptance_count + self.rejection_count;
        if decided == 0 {
            None
        } else {
            Some(self.acceptance_count as f64 / decided as f64)
        }
    }

    /// Confidence bonus derived from the score, within ±0.2.
    pub fn bonus(&self) -> f64 {
        (self.preference_score * BONUS_SCALE).clamp(-MAX_BONUS, MAX_BONUS)
    }

    fn apply_delta(&mut self, delta: f64, now: DateTime<Utc>) {
        let next = self.preference_score + delta;
        self.preference_score = if next.is_finite() {
            next.clamp(-1.0, 1.0)
        } else {
            self.preference_score
        };
        self.last_updated = now;
    }
}

/// A user feedback event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LearningEvent {
    Acceptance {
        category: PlaceCategory,
        confidence: f64,
    },
    Rejection {
        category: PlaceCategory,
        confidence: f64,
    },
    Correction {
        from: PlaceCategory,
        to: PlaceCategory,
        confidence: f64,
    },
}

/// A category correction recorded by the review subsystem.
///
/// Categories are kept as raw names because they come from outside the
/// crate and may not parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCorrection {
    pub id: Uuid,
    pub from_category: String,
    pub to_category: String,
    pub confidence: f64,
    #[serde(default)]
    pub applied: bool,
}

impl UserCorrection {
    pub fn new(from: impl Into<String>, to: impl Into<String>, confidence: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_category: from.into(),
            to_category: to.into(),
            confidence,
            applied: false,
        }
    }
}

/// Outcome of a correction replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaySummary {
    /// Corrections learned from and marked applied
    pub applied: usize,
    /// Malformed corrections, marked applied without learning
    pub skipped: usize,
    /// Corrections that hit a store error and stay unapplied
    pub failed: usize,
}

#[derive(Debug, Default)]
struct LearnerState {
    preferences: HashMap<PlaceCategory, CategoryPreference>,
    /// Corrections consumed this session, guards against double application
    /// when the queue fails to record them.
    consumed_corrections: HashSet<Uuid>,
}

/// Per-category preference learner.
pub struct CategoryLearner {
    state: Mutex<LearnerState>,
    store: Option<Arc<dyn PreferenceStore>>,
}

impl std::fmt::Debug for CategoryLearner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CategoryLearner")
            .field("preferences", &self.preferences().len())
            .field("persistent", &self.store.is_some())
            .finish()
    }
}

impl Default for CategoryLearner {
    fn default() -> Self {
        Self::new()
    }
}

impl CategoryLearner {
    /// Create an in-memory learner with no preferences.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LearnerState::default()),
            store: None,
        }
    }

    /// Create a learner backed by a store, loading existing preferences.
    pub fn with_store(store: Arc<dyn PreferenceStore>) -> Result<Self> {
        let loaded = store.load_all()?;
        let mut state = LearnerState::default();
        for mut pref in loaded {
            pref.preference_score = pref.preference_score.clamp(-1.0, 1.0);
            state.preferences.insert(pref.category, pref);
        }
        info!(
            "Category learner loaded {} preferences",
            state.preferences.len()
        );
        Ok(Self {
            state: Mutex::new(state),
            store: Some(store),
        })
    }

    fn lock(&self) -> MutexGuard<'_, LearnerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current preference for a category, if any event has touched it.
    pub fn preference(&self, category: PlaceCategory) -> Option<CategoryPreference> {
        self.lock().preferences.get(&category).cloned()
    }

    pub fn score(&self, category: PlaceCategory) -> f64 {
        self.preference(category)
            .map(|p| p.preference_score)
            .unwrap_or(0.0)
    }

    /// Auto-accept bonus for a category, within ±0.2.
    pub fn bonus(&self, category: PlaceCategory) -> f64 {
        self.preference(category).map(|p| p.bonus()).unwrap_or(0.0)
    }

    /// Snapshot of all preferences, ordered by category.
    pub fn preferences(&self) -> Vec<CategoryPreference> {
        let mut prefs: Vec<CategoryPreference> =
            self.lock().preferences.values().cloned().collect();
        prefs.sort_by_key(|p| p.category);
        prefs
    }

    /// Forget all learned preferences.
    pub fn reset(&self) -> Result<()> {
        let mut state = self.lock();
        if let Some(store) = &self.store {
            store.clear()?;
        }
        state.preferences.clear();
        state.consumed_corrections.clear();
        Ok(())
    }

    pub fn record_acceptance(
        &self,
        category: PlaceCategory,
        confidence: f64,
    ) -> Result<CategoryPreference> {
        self.record(LearningEvent::Acceptance {
            category,
            confidence,
        })?
        .into_iter()
        .next()
        .ok_or_else(nothing_updated)
    }

    pub fn record_rejection(
        &self,
        category: PlaceCategory,
        confidence: f64,
    ) -> Result<CategoryPreference> {
        self.record(LearningEvent::Rejection {
            category,
            confidence,
        })?
        .into_iter()
        .next()
        .ok_or_else(nothing_updated)
    }

    /// Returns the updated (from, to) preferences.
    pub fn record_correction(
        &self,
        from: PlaceCategory,
        to: PlaceCategory,
        confidence: f64,
    ) -> Result<(CategoryPreference, CategoryPreference)> {
        let mut updated = self
            .record(LearningEvent::Correction {
                from,
                to,
                confidence,
            })?
            .into_iter();
        let from_pref = updated.next().ok_or_else(nothing_updated)?;
        // from == to collapses into a single preference
        let to_pref = updated.next().unwrap_or_else(|| from_pref.clone());
        Ok((from_pref, to_pref))
    }

    /// Apply one event atomically. Returns the updated preferences in event
    /// order (`from` before `to` for corrections).
    pub fn record(&self, event: LearningEvent) -> Result<Vec<CategoryPreference>> {
        let now = Utc::now();
        let mut state = self.lock();

        let deltas: Vec<(PlaceCategory, f64, Counter)> = match event {
            LearningEvent::Acceptance {
                category,
                confidence,
            } => vec![(
                category,
                ACCEPTANCE_RATE * unit(confidence),
                Counter::Acceptance,
            )],
            LearningEvent::Rejection {
                category,
                confidence,
            } => vec![(
                category,
                -REJECTION_RATE * unit(confidence),
                Counter::Rejection,
            )],
            LearningEvent::Correction { from, to, .. } if from == to => {
                vec![(to, 0.0, Counter::Correction)]
            }
            LearningEvent::Correction {
                from,
                to,
                confidence,
            } => vec![
                (
                    from,
                    -CORRECTION_PENALTY_RATE * unit(confidence),
                    Counter::Correction,
                ),
                (to, CORRECTION_REWARD, Counter::None),
            ],
        };

        let mut updated = Vec::with_capacity(deltas.len());
        for (category, delta, counter) in deltas {
            let mut pref = state
                .preferences
                .get(&category)
                .cloned()
                .unwrap_or_else(|| CategoryPreference::new(category, now));
            pref.apply_delta(delta, now);
            match counter {
                Counter::Acceptance => pref.acceptance_count += 1,
                Counter::Rejection => pref.rejection_count += 1,
                Counter::Correction => pref.correction_count += 1,
                Counter::None => {}
            }
            updated.push(pref);
        }

        if let Some(store) = &self.store {
            for pref in &updated {
                store.save(pref)?;
            }
        }
        for pref in &updated {
            debug!(
                "Preference {} -> {:.3} ({:?})",
                pref.category, pref.preference_score, event
            );
            state.preferences.insert(pref.category, pref.clone());
        }

        Ok(updated)
    }

    /// Learn from every unapplied correction in the queue.
    ///
    /// Malformed category names are marked applied and counted as skipped.
    /// Store failures leave the correction unapplied for a later replay and do
    /// not stop the batch.
    pub fn replay_corrections(&self, queue: &dyn CorrectionQueue) -> Result<ReplaySummary> {
        let mut summary = ReplaySummary::default();

        for correction in queue.unapplied()? {
            // Claiming under one lock keeps concurrent replays from both
            // applying the same correction
            if correction.applied || !self.claim(correction.id) {
                continue;
            }

            let parsed = correction
                .from_category
                .parse::<PlaceCategory>()
                .and_then(|from| correction.to_category.parse::<PlaceCategory>().map(|to| (from, to)));

            match parsed {
                Err(e) => {
                    warn!("Skipping correction {}: {}", correction.id, e);
                    self.consume(&correction, queue);
                    summary.skipped += 1;
                }
                Ok((from, to)) => match self.record_correction(from, to, correction.confidence) {
                    Ok(_) => {
                        self.consume(&correction, queue);
                        summary.applied += 1;
                    }
                    Err(e) => {
                        warn!("Correction {} not applied: {}", correction.id, e);
                        self.release(correction.id);
                        summary.failed += 1;
                    }
                },
            }
        }

        info!(
            "Correction replay: {} applied, {} skipped, {} failed",
            summary.applied, summary.skipped, summary.failed
        );
        Ok(summary)
    }

    /// Returns false when the correction was already claimed.
    fn claim(&self, id: Uuid) -> bool {
        self.lock().consumed_corrections.insert(id)
    }

    fn release(&self, id: Uuid) {
        self.lock().consumed_corrections.remove(&id);
    }

    fn consume(&self, correction: &UserCorrection, queue: &dyn CorrectionQueue) {
        if let Err(e) = queue.mark_applied(correction.id) {
            warn!(
                "Failed to mark correction {} applied: {}",
                correction.id, e
            );
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Counter {
    Acceptance,
    Rejection,
    Correction,
    None,
}

fn nothing_updated() -> PlaceMatchError {
    PlaceMatchError::store("record_event", "event updated no preference")
}

fn unit(confidence: f64) -> f64 {
    if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
