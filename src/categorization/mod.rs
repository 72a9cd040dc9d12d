//! # Place Categorization
//!
//! Turns a cluster's samples into a category guess and a confidence.
//!
//! - `patterns` - hour/weekday histograms and session statistics
//! - `scorer` - independent per-category scores, arg-max selection
//! - `confidence` - observation quality, independent of the category

mod confidence;
mod patterns;
mod scorer;

pub use confidence::{confidence_from_parts, estimate_confidence};
pub use patterns::{
    VisitPatterns, is_meal_hour, is_night_hour, is_school_hour, is_shopping_hour, is_work_hour,
    is_workout_hour,
};
pub use scorer::{
    CategoryScores, SCORED_CATEGORIES, score_categories, score_patterns, select_category,
};

use crate::config::ScorerConfig;
use crate::{LocationSample, PlaceCategory};

/// Score samples and select a category in one step.
pub fn categorize(samples: &[LocationSample], config: &ScorerConfig) -> PlaceCategory {
    let scores = score_categories(samples, config);
    select_category(&scores, config.sanitized().acceptance_threshold)
}
