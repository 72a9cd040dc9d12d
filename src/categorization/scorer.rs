//! Score-based category selection.
//!
//! Every scored category gets an independent score in [0, 1]. The best score
//! wins if it reaches the acceptance threshold. Ties go to the category
//! declared first in [`PlaceCategory`], so the result never depends on
//! evaluation order.

use serde::{Deserialize, Serialize};

use super::patterns::{
    VisitPatterns, is_meal_hour, is_night_hour, is_school_hour, is_shopping_hour, is_work_hour,
    is_workout_hour,
};
use crate::config::ScorerConfig;
use crate::{LocationSample, PlaceCategory};

/// Categories the scorer has signals for, in tie-break order.
pub const SCORED_CATEGORIES: [PlaceCategory; 6] = [
    PlaceCategory::Home,
    PlaceCategory::Work,
    PlaceCategory::Education,
    PlaceCategory::Gym,
    PlaceCategory::Shopping,
    PlaceCategory::Restaurant,
];

/// Scores for each scored category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScores {
    scores: Vec<(PlaceCategory, f64)>,
}

impl CategoryScores {
    pub fn get(&self, category: PlaceCategory) -> f64 {
        self.scores
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, s)| *s)
            .unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(PlaceCategory, f64)> {
        self.scores.iter()
    }

    /// Highest score; the earliest category wins ties.
    pub fn best(&self) -> Option<(PlaceCategory, f64)> {
        let mut ordered = self.scores.clone();
        ordered.sort_by_key(|(c, _)| *c);
        ordered.into_iter().fold(None, |best, (category, score)| match best {
            Some((_, best_score)) if score <= best_score => best,
            _ => Some((category, score)),
        })
    }
}

/// Score every category from raw samples.
pub fn score_categories(samples: &[LocationSample], config: &ScorerConfig) -> CategoryScores {
    let config = config.sanitized();
    let patterns = VisitPatterns::from_samples(samples, &config);
    score_patterns(&patterns, &config)
}

/// Score every category from precomputed patterns.
pub fn score_patterns(patterns: &VisitPatterns, config: &ScorerConfig) -> CategoryScores {
    let scores = SCORED_CATEGORIES
        .iter()
        .map(|&category| {
            let score = match category {
                PlaceCategory::Home => home_score(patterns, config),
                PlaceCategory::Work => work_score(patterns, config),
                PlaceCategory::Education => education_score(patterns, config),
                PlaceCategory::Gym => gym_score(patterns),
                PlaceCategory::Shopping => shopping_score(patterns),
                PlaceCategory::Restaurant => restaurant_score(patterns),
                _ => 0.0,
            };
            (category, score.clamp(0.0, 1.0))
        })
        .collect();
    CategoryScores { scores }
}

/// Pick the best category, or Unknown when nothing reaches `threshold`.
pub fn select_category(scores: &CategoryScores, threshold: f64) -> PlaceCategory {
    match scores.best() {
        Some((category, score)) if score >= threshold && score > 0.0 => category,
        _ => PlaceCategory::Unknown,
    }
}

fn home_score(p: &VisitPatterns, config: &ScorerConfig) -> f64 {
    let night = p.hour_ratio(is_night_hour);
    if night >= config.home_night_ratio {
        night
    } else if night >= config.home_possible_ratio {
        night * 0.6
    } else {
        night * 0.2
    }
}

fn work_score(p: &VisitPatterns, config: &ScorerConfig) -> f64 {
    let hours = p.hour_ratio(is_work_hour);
    let weekdays = p.weekday_ratio();
    let joint = hours * weekdays;
    if hours >= config.work_hour_ratio && weekdays >= config.weekday_ratio {
        joint
    } else {
        joint * 0.5
    }
}

fn education_score(p: &VisitPatterns, config: &ScorerConfig) -> f64 {
    let hours = p.hour_ratio(is_school_hour);
    let weekdays = p.weekday_ratio();
    let joint = hours * weekdays;
    if hours >= config.school_hour_ratio && weekdays >= config.weekday_ratio {
        joint
    } else {
        joint * 0.6
    }
}

fn gym_score(p: &VisitPatterns) -> f64 {
    let hours = p.hour_ratio(is_workout_hour);
    let frequency = if (2.0..=4.0).contains(&p.visits_per_week) {
        1.0
    } else if (1.0..=6.0).contains(&p.visits_per_week) {
        0.5
    } else {
        0.1
    };
    let duration = window_factor(p.average_session_minutes, 30.0, 120.0, 15.0, 180.0);
    hours * frequency * duration
}

fn shopping_score(p: &VisitPatterns) -> f64 {
    let duration = window_factor(p.average_session_minutes, 10.0, 60.0, 5.0, 120.0);
    duration * irregularity_factor(p) * p.hour_ratio(is_shopping_hour)
}

fn restaurant_score(p: &VisitPatterns) -> f64 {
    let duration = window_factor(p.average_session_minutes, 30.0, 120.0, 15.0, 180.0);
    duration * p.hour_ratio(is_meal_hour) * irregularity_factor(p)
}

/// 1.0 inside [lo, hi], 0.5 inside the wider [outer_lo, outer_hi], else 0.1.
fn window_factor(value: f64, lo: f64, hi: f64, outer_lo: f64, outer_hi: f64) -> f64 {
    if (lo..=hi).contains(&value) {
        1.0
    } else if (outer_lo..=outer_hi).contains(&value) {
        0.5
    } else {
        0.1
    }
}

/// Frequent visits look like home or work, not errands.
fn irregularity_factor(p: &VisitPatterns) -> f64 {
    if p.visits_per_week <= 2.0 {
        1.0
    } else if p.visits_per_week <= 4.0 {
        0.6
    } else {
        0.3
    }
}
