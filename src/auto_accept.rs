//! Auto-accept decisions for detected places.
//!
//! Rules are applied in order:
//! 1. disabled category → reject
//! 2. always-review category → high priority review
//! 3. dispatch on the configured [`AutoAcceptStrategy`]

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::AutoAcceptConfig;
use crate::learning::CategoryLearner;
use crate::{Place, PlaceCategory};

/// Bonus for an enrichment category that matches exactly.
pub const OSM_EXACT_BONUS: f64 = 0.15;
/// Bonus for an enrichment category in the same affinity group.
pub const OSM_SIMILAR_BONUS: f64 = 0.08;

/// Slack for comparing confidence gaps against the priority bands.
const GAP_EPSILON: f64 = 1e-9;

/// How new places are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AutoAcceptStrategy {
    /// Every place goes to review.
    Never,
    /// Accept when the adjusted confidence reaches `threshold`.
    HighConfidenceOnly { threshold: f64 },
    /// Accept once the place has been visited `visits` times.
    AfterNVisits { visits: u32 },
    /// Accept everything that is not disabled or forced to review.
    Always,
}

impl AutoAcceptStrategy {
    pub fn sanitized(&self) -> Self {
        match *self {
            AutoAcceptStrategy::HighConfidenceOnly { threshold } => {
                let threshold = if threshold.is_finite() {
                    threshold.clamp(0.0, 1.0)
                } else {
                    0.7
                };
                AutoAcceptStrategy::HighConfidenceOnly { threshold }
            }
            AutoAcceptStrategy::AfterNVisits { visits } => AutoAcceptStrategy::AfterNVisits {
                visits: visits.max(1),
            },
            other => other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AutoAcceptStrategy::Never => "never",
            AutoAcceptStrategy::HighConfidenceOnly { .. } => "high_confidence_only",
            AutoAcceptStrategy::AfterNVisits { .. } => "after_n_visits",
            AutoAcceptStrategy::Always => "always",
        }
    }
}

/// Which rule accepted a place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptStatus {
    HighConfidence,
    VisitThresholdReached,
    AlwaysAccept,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewPriority {
    Low,
    Normal,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewReason {
    NewPlace,
    CategoryUncertain,
    LowConfidence,
    MultipleVisits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    CategoryDisabled,
}

/// What to do with a detected place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AutoAcceptDecision {
    AutoAccept {
        status: AcceptStatus,
    },
    NeedsReview {
        priority: ReviewPriority,
        reason: ReviewReason,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },
    Reject {
        reason: RejectReason,
    },
}

impl AutoAcceptDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, AutoAcceptDecision::AutoAccept { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, AutoAcceptDecision::Reject { .. })
    }

    fn review(priority: ReviewPriority, reason: ReviewReason, note: Option<String>) -> Self {
        AutoAcceptDecision::NeedsReview {
            priority,
            reason,
            note,
        }
    }
}

/// Enrichment bonus: exact match 0.15, same affinity group 0.08, else 0.
pub fn osm_bonus(detected: PlaceCategory, suggested: Option<PlaceCategory>) -> f64 {
    match suggested {
        Some(_) if detected == PlaceCategory::Unknown => 0.0,
        Some(s) if s == detected => OSM_EXACT_BONUS,
        Some(s) if detected.is_similar_to(s) => OSM_SIMILAR_BONUS,
        _ => 0.0,
    }
}

/// Applies the configured acceptance policy.
#[derive(Debug, Clone)]
pub struct AutoAcceptEngine {
    config: AutoAcceptConfig,
}

impl Default for AutoAcceptEngine {
    fn default() -> Self {
        Self::new(AutoAcceptConfig::default())
    }
}

impl AutoAcceptEngine {
    pub fn new(config: AutoAcceptConfig) -> Self {
        Self {
            config: config.sanitized(),
        }
    }

    pub fn config(&self) -> &AutoAcceptConfig {
        &self.config
    }

    /// Decide using the learner's bonus for the place's category.
    pub fn decide_with_learner(
        &self,
        place: &Place,
        learner: &CategoryLearner,
        suggested: Option<PlaceCategory>,
    ) -> AutoAcceptDecision {
        let learned = learner.bonus(place.category);
        self.decide(place, learned, osm_bonus(place.category, suggested))
    }

    /// Decide with explicit bonuses.
    pub fn decide(&self, place: &Place, learned_bonus: f64, osm_bonus: f64) -> AutoAcceptDecision {
        let decision = self.evaluate(place, learned_bonus, osm_bonus);
        debug!(
            "Auto-accept '{}' ({}, confidence {:.2}, {} visits): {:?}",
            place.name, place.category, place.confidence, place.visit_count, decision
        );
        decision
    }

    fn evaluate(&self, place: &Place, learned_bonus: f64, osm_bonus: f64) -> AutoAcceptDecision {
        if self.config.disabled_categories.contains(&place.category) {
            return AutoAcceptDecision::Reject {
                reason: RejectReason::CategoryDisabled,
            };
        }
        if self.config.always_review_categories.contains(&place.category) {
            return AutoAcceptDecision::review(
                ReviewPriority::High,
                ReviewReason::CategoryUncertain,
                None,
            );
        }

        match self.config.strategy {
            AutoAcceptStrategy::Never => {
                AutoAcceptDecision::review(ReviewPriority::Normal, ReviewReason::NewPlace, None)
            }
            AutoAcceptStrategy::HighConfidenceOnly { threshold } => {
                let adjusted = finite_or_zero(place.confidence + learned_bonus + osm_bonus)
                    .clamp(0.0, 1.0);
                if adjusted >= threshold {
                    return AutoAcceptDecision::AutoAccept {
                        status: AcceptStatus::HighConfidence,
                    };
                }
                let gap = threshold - adjusted;
                let priority = if gap <= 0.1 + GAP_EPSILON {
                    ReviewPriority::Low
                } else if gap <= 0.2 + GAP_EPSILON {
                    ReviewPriority::Normal
                } else {
                    ReviewPriority::High
                };
                AutoAcceptDecision::review(
                    priority,
                    ReviewReason::LowConfidence,
                    Some(format!("confidence {adjusted:.2} below {threshold:.2}")),
                )
            }
            AutoAcceptStrategy::AfterNVisits { visits } => {
                if place.confidence < self.config.min_confidence_floor {
                    return AutoAcceptDecision::review(
                        ReviewPriority::High,
                        ReviewReason::LowConfidence,
                        None,
                    );
                }
                if place.visit_count >= visits {
                    AutoAcceptDecision::AutoAccept {
                        status: AcceptStatus::VisitThresholdReached,
                    }
                } else {
                    AutoAcceptDecision::review(
                        ReviewPriority::Normal,
                        ReviewReason::MultipleVisits,
                        Some(format!("{}/{}", place.visit_count, visits)),
                    )
                }
            }
            AutoAcceptStrategy::Always => AutoAcceptDecision::AutoAccept {
                status: AcceptStatus::AlwaysAccept,
            },
        }
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}
