//! # Place Detection Engine
//!
//! Runs the full pipeline over one batch of samples and commits the result
//! through the collaborator seams.
//!
//! ## Architecture
//!
//! The engine is composed of focused modules:
//! - `PlaceStore` - place and visit persistence with radius lookups
//! - `PreferenceStore` - learned category preferences
//! - `CorrectionQueue` - user corrections awaiting replay
//! - `CategoryEnrichment` - optional POI category and name suggestions
//! - `progress` - phase callbacks
//!
//! A pass has two phases. Planning only reads from the store and can be
//! cancelled at any cluster boundary. Committing writes each place on its
//! own, so a failed write never aborts the remaining clusters.

pub mod correction_queue;
pub mod enrichment;
pub mod place_store;
pub mod preference_store;
pub mod progress;

pub use correction_queue::{CorrectionQueue, InMemoryCorrectionQueue};
pub use enrichment::{CategoryEnrichment, EnrichmentSuggestion, suggest_name};
pub use place_store::{InMemoryPlaceStore, PlaceStore};
pub use preference_store::{InMemoryPreferenceStore, PreferenceStore};
pub use progress::{
    AtomicProgressTracker, DetectionPhase, DetectionProgressCallback, NoopProgress,
};

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auto_accept::{AutoAcceptDecision, AutoAcceptEngine};
use crate::categorization::{categorize, estimate_confidence};
use crate::clustering::{ClusterCandidate, cluster_samples_with_stats};
use crate::config::DetectionConfig;
use crate::duplicates::assess_duplicate;
use crate::learning::CategoryLearner;
use crate::quality::filter_samples_with_stats;
use crate::sessions::segment_sessions;
use crate::{LocationSample, Place, PlaceCategory, PlaceMatchError, Result, Visit};

/// Cooperative cancellation flag shared between caller and detector.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A new place produced by a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedPlace {
    pub place: Place,
    pub visits: Vec<Visit>,
    pub decision: AutoAcceptDecision,
    /// Category suggested by enrichment, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_category: Option<PlaceCategory>,
    /// Simplified place written after the full write failed
    #[serde(default)]
    pub is_fallback: bool,
}

/// An existing place refreshed by a duplicate cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceUpdate {
    pub place: Place,
    pub new_visits: Vec<Visit>,
    /// The place moved from Unknown to a scored category
    pub recategorized: bool,
}

/// Decision handed to the review subsystem for a new place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    pub id: Uuid,
    pub place_id: Uuid,
    pub decision: AutoAcceptDecision,
    pub created_at: DateTime<Utc>,
}

impl ReviewRecord {
    pub fn new(place_id: Uuid, decision: AutoAcceptDecision) -> Self {
        Self {
            id: Uuid::new_v4(),
            place_id,
            decision,
            created_at: Utc::now(),
        }
    }
}

/// Counters from one detection pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionStats {
    pub samples_in: usize,
    /// Oldest samples dropped by `max_samples_per_pass`
    pub samples_capped: usize,
    pub samples_kept: usize,
    /// Oldest kept samples dropped by the clustering cap
    pub cluster_cap_dropped: usize,
    pub noise_samples: usize,
    pub clusters: usize,
    pub duplicates: usize,
    pub new_places: usize,
    pub updated_places: usize,
    pub rejected: usize,
    pub fallback_places: usize,
    pub failed_writes: usize,
    pub lookup_failures: usize,
}

/// Result of a detection pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionReport {
    pub new_places: Vec<DetectedPlace>,
    pub updated_places: Vec<PlaceUpdate>,
    pub reviews: Vec<ReviewRecord>,
    pub stats: DetectionStats,
}

impl DetectionReport {
    /// New places committed without needing review.
    pub fn accepted(&self) -> impl Iterator<Item = &DetectedPlace> {
        self.new_places.iter().filter(|p| p.decision.is_accepted())
    }
}

/// A new place awaiting its decision and commit.
struct Draft {
    place: Place,
    visits: Vec<Visit>,
    suggested_category: Option<PlaceCategory>,
}

#[derive(Default)]
struct Plan {
    drafts: Vec<Draft>,
    updates: Vec<PlaceUpdate>,
    duplicates: usize,
    lookup_failures: usize,
}

/// Where a duplicate cluster's visits go.
#[derive(Clone, Copy)]
enum Target {
    Draft(usize),
    Update(usize),
}

/// Clears the running flag when a pass ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Single-flight place detector.
///
/// Only one pass runs at a time; a concurrent call fails with
/// [`PlaceMatchError::AlreadyRunning`] instead of queueing.
pub struct PlaceDetector {
    config: DetectionConfig,
    store: Arc<dyn PlaceStore>,
    learner: Arc<CategoryLearner>,
    acceptor: AutoAcceptEngine,
    enrichment: Option<Arc<dyn CategoryEnrichment>>,
    progress: Arc<dyn DetectionProgressCallback>,
    running: AtomicBool,
}

impl PlaceDetector {
    pub fn new(
        config: DetectionConfig,
        store: Arc<dyn PlaceStore>,
        learner: Arc<CategoryLearner>,
    ) -> Self {
        let config = config.sanitized();
        Self {
            acceptor: AutoAcceptEngine::new(config.auto_accept.clone()),
            config,
            store,
            learner,
            enrichment: None,
            progress: Arc::new(NoopProgress),
            running: AtomicBool::new(false),
        }
    }

    pub fn with_enrichment(mut self, enrichment: Arc<dyn CategoryEnrichment>) -> Self {
        self.enrichment = Some(enrichment);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn DetectionProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn learner(&self) -> &Arc<CategoryLearner> {
        &self.learner
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run one detection pass.
    pub fn detect(&self, samples: &[LocationSample]) -> Result<DetectionReport> {
        self.detect_with_cancel(samples, &CancellationToken::new())
    }

    /// Run one detection pass that the caller may cancel.
    ///
    /// Cancellation is honoured until the commit phase starts. A cancelled
    /// pass writes nothing.
    pub fn detect_with_cancel(
        &self,
        samples: &[LocationSample],
        cancel: &CancellationToken,
    ) -> Result<DetectionReport> {
        let _guard = self.begin()?;
        let mut stats = DetectionStats {
            samples_in: samples.len(),
            ..DetectionStats::default()
        };

        let batch = self.cap_batch(samples, &mut stats);

        self.progress
            .on_phase(DetectionPhase::Filtering, batch.len() as u32);
        let (kept, filter_stats) = filter_samples_with_stats(&batch, &self.config.quality);
        stats.samples_kept = filter_stats.kept;
        debug!("[Detect] Filter: {:?}", filter_stats);
        if cancel.is_cancelled() {
            return Err(PlaceMatchError::Cancelled { clusters_planned: 0 });
        }

        self.progress
            .on_phase(DetectionPhase::Clustering, kept.len() as u32);
        let (clusters, cluster_stats) = cluster_samples_with_stats(&kept, &self.config.cluster);
        stats.clusters = cluster_stats.clusters;
        stats.cluster_cap_dropped = cluster_stats.truncated;
        stats.noise_samples = cluster_stats.noise;

        let plan = self.plan(clusters, cancel)?;
        stats.duplicates = plan.duplicates;
        stats.lookup_failures = plan.lookup_failures;

        let report = self.commit(plan, stats);
        let stats = &report.stats;
        info!(
            "[Detect] {} samples in, {} kept, {} clusters: {} new, {} updated, {} duplicates, {} rejected, {} fallbacks, {} failed",
            stats.samples_in,
            stats.samples_kept,
            stats.clusters,
            stats.new_places,
            stats.updated_places,
            stats.duplicates,
            stats.rejected,
            stats.fallback_places,
            stats.failed_writes
        );
        Ok(report)
    }

    fn begin(&self) -> Result<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| PlaceMatchError::AlreadyRunning)?;
        Ok(RunGuard(&self.running))
    }

    /// Time-order the batch and keep the most recent `max_samples_per_pass`.
    fn cap_batch(
        &self,
        samples: &[LocationSample],
        stats: &mut DetectionStats,
    ) -> Vec<LocationSample> {
        let mut batch = samples.to_vec();
        batch.sort_by_key(|s| s.timestamp);

        let cap = self.config.max_samples_per_pass;
        if batch.len() > cap {
            stats.samples_capped = batch.len() - cap;
            info!(
                "[Detect] Batch cap reached: using the most recent {} of {} samples",
                cap,
                batch.len()
            );
            batch.drain(..stats.samples_capped);
        }
        batch
    }

    fn plan(&self, clusters: Vec<ClusterCandidate>, cancel: &CancellationToken) -> Result<Plan> {
        let config = &self.config;
        let mut plan = Plan::default();
        let mut targets: HashMap<Uuid, Target> = HashMap::new();

        let cluster_count = clusters.len();
        self.progress
            .on_phase(DetectionPhase::Planning, cluster_count as u32);

        for (cluster_idx, candidate) in clusters.into_iter().enumerate() {
            if cancel.is_cancelled() {
                info!("[Detect] Cancelled after planning {} clusters", cluster_idx);
                return Err(PlaceMatchError::Cancelled {
                    clusters_planned: cluster_idx,
                });
            }
            self.progress.on_progress();

            let centroid = candidate.centroid;
            let mut nearby = match self.store.places_near(
                centroid.latitude,
                centroid.longitude,
                config.duplicates.search_radius_km,
            ) {
                Ok(places) => places,
                Err(e) => {
                    warn!("[Detect] Skipping cluster {}: {}", cluster_idx, e);
                    plan.lookup_failures += 1;
                    continue;
                }
            };
            // Places planned earlier in this pass are not in the store yet.
            nearby.extend(plan.drafts.iter().map(|d| d.place.clone()));

            let assessment =
                assess_duplicate(&centroid, &candidate.points(), &nearby, &config.duplicates);

            let Some(matched_id) = assessment.matched_place_id(&config.duplicates) else {
                let draft = self.draft_place(&candidate);
                debug!(
                    "[Detect] Cluster {}: new place '{}' ({}, {} samples, {} visits)",
                    cluster_idx,
                    draft.place.name,
                    draft.place.category,
                    candidate.len(),
                    draft.visits.len()
                );
                targets.insert(draft.place.id, Target::Draft(plan.drafts.len()));
                plan.drafts.push(draft);
                continue;
            };

            plan.duplicates += 1;
            debug!(
                "[Detect] Cluster {}: duplicate of {} (distance {:?}, overlap {:.2})",
                cluster_idx, matched_id, assessment.min_distance_to_existing, assessment.overlap_ratio
            );

            match targets.get(&matched_id).copied() {
                Some(Target::Draft(i)) => {
                    let draft = &mut plan.drafts[i];
                    let visits = self.session_visits(&candidate, draft.place.id);
                    draft.place.visit_count =
                        draft.place.visit_count.saturating_add(visits.len() as u32);
                    draft.visits.extend(visits);
                }
                Some(Target::Update(i)) => {
                    let previous = &plan.updates[i];
                    let mut update = self.refresh_place(previous.place.clone(), &candidate);
                    update.recategorized |= previous.recategorized;
                    let mut visits = previous.new_visits.clone();
                    visits.append(&mut update.new_visits);
                    update.new_visits = visits;
                    plan.updates[i] = update;
                }
                None => match nearby.into_iter().find(|p| p.id == matched_id) {
                    Some(existing) => {
                        targets.insert(matched_id, Target::Update(plan.updates.len()));
                        plan.updates.push(self.refresh_place(existing, &candidate));
                    }
                    None => warn!(
                        "[Detect] Cluster {} matched unknown place {}",
                        cluster_idx, matched_id
                    ),
                },
            }
        }

        if cancel.is_cancelled() {
            return Err(PlaceMatchError::Cancelled {
                clusters_planned: cluster_count,
            });
        }
        Ok(plan)
    }

    fn session_visits(&self, candidate: &ClusterCandidate, place_id: Uuid) -> Vec<Visit> {
        segment_sessions(&candidate.samples, &self.config.sessions)
            .into_iter()
            .map(|s| s.into_visit(place_id))
            .collect()
    }

    fn draft_place(&self, candidate: &ClusterCandidate) -> Draft {
        let config = &self.config;
        let category = if config.auto_categorization_enabled {
            categorize(&candidate.samples, &config.scorer)
        } else {
            PlaceCategory::Unknown
        };
        let confidence = estimate_confidence(candidate, &config.confidence);
        let suggestion = self
            .enrichment
            .as_ref()
            .and_then(|e| e.suggest(&candidate.centroid));

        let mut place = Place::new(
            suggest_name(category, suggestion.as_ref()),
            candidate.centroid,
            candidate.radius,
            confidence,
        );
        place.category = category;

        let visits = self.session_visits(candidate, place.id);
        place.visit_count = visits.len() as u32;

        Draft {
            place,
            visits,
            suggested_category: suggestion.and_then(|s| s.category),
        }
    }

    /// Attach a duplicate cluster to an existing place.
    fn refresh_place(&self, mut place: Place, candidate: &ClusterCandidate) -> PlaceUpdate {
        let config = &self.config;

        let new_visits = if config.attach_visits_to_existing {
            self.session_visits(candidate, place.id)
        } else {
            Vec::new()
        };
        place.visit_count = place.visit_count.saturating_add(new_visits.len() as u32);

        let user_edited = place.is_user_edited();
        if !user_edited {
            let confidence = estimate_confidence(candidate, &config.confidence);
            if confidence > place.confidence {
                place.confidence = confidence;
            }
        }

        let mut recategorized = false;
        let may_rescore = !user_edited || config.rescore_user_edited_places;
        if place.category == PlaceCategory::Unknown
            && config.auto_categorization_enabled
            && may_rescore
        {
            let category = categorize(&candidate.samples, &config.scorer);
            if category != PlaceCategory::Unknown {
                place.category = category;
                recategorized = true;
            }
        }

        PlaceUpdate {
            place,
            new_visits,
            recategorized,
        }
    }

    fn commit(&self, plan: Plan, mut stats: DetectionStats) -> DetectionReport {
        let mut report = DetectionReport::default();

        self.progress.on_phase(
            DetectionPhase::Committing,
            (plan.updates.len() + plan.drafts.len()) as u32,
        );

        for update in plan.updates {
            self.progress.on_progress();
            match self.store.update_place(&update.place, &update.new_visits) {
                Ok(()) => {
                    stats.updated_places += 1;
                    report.updated_places.push(update);
                }
                Err(e) => {
                    warn!("[Detect] Failed to update place {}: {}", update.place.id, e);
                    stats.failed_writes += 1;
                }
            }
        }

        for draft in plan.drafts {
            self.progress.on_progress();
            let decision = self.acceptor.decide_with_learner(
                &draft.place,
                &self.learner,
                draft.suggested_category,
            );
            if decision.is_rejected() {
                debug!(
                    "[Detect] Not committing '{}': {:?}",
                    draft.place.name, decision
                );
                stats.rejected += 1;
                continue;
            }

            if let Some(detected) = self.insert_draft(draft, decision, &mut stats) {
                report
                    .reviews
                    .push(ReviewRecord::new(detected.place.id, detected.decision.clone()));
                report.new_places.push(detected);
            }
        }

        stats.new_places = report.new_places.len();
        report.stats = stats;
        report
    }

    /// Write a new place, retrying once as a simplified place on failure.
    fn insert_draft(
        &self,
        draft: Draft,
        decision: AutoAcceptDecision,
        stats: &mut DetectionStats,
    ) -> Option<DetectedPlace> {
        let Draft {
            place,
            visits,
            suggested_category,
        } = draft;

        let error = match self.store.insert_place(&place, &visits) {
            Ok(()) => {
                return Some(DetectedPlace {
                    place,
                    visits,
                    decision,
                    suggested_category,
                    is_fallback: false,
                });
            }
            Err(e) => e,
        };
        warn!(
            "[Detect] Failed to insert place '{}': {}, retrying without visits",
            place.name, error
        );

        let fallback = Place::new(
            PlaceCategory::Unknown.display_name(),
            place.center(),
            place.radius,
            place.confidence,
        );
        let decision = self
            .acceptor
            .decide_with_learner(&fallback, &self.learner, None);
        if decision.is_rejected() {
            debug!(
                "[Detect] Not committing fallback for '{}': {:?}",
                place.name, decision
            );
            stats.rejected += 1;
            return None;
        }

        match self.store.insert_place(&fallback, &[]) {
            Ok(()) => {
                stats.fallback_places += 1;
                Some(DetectedPlace {
                    place: fallback,
                    visits: Vec::new(),
                    decision,
                    suggested_category,
                    is_fallback: true,
                })
            }
            Err(e) => {
                warn!("[Detect] Fallback insert failed: {}", e);
                stats.failed_writes += 1;
                None
            }
        }
    }
}
