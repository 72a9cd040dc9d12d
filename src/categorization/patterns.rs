//! Temporal visit patterns derived from a cluster's samples.

use chrono::{Datelike, FixedOffset, Offset, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::LocationSample;
use crate::config::ScorerConfig;
use crate::sessions::segment_with;

/// Histograms and session statistics the category scorer works from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitPatterns {
    pub sample_count: usize,
    /// Samples per local hour of day
    pub hour_histogram: [usize; 24],
    /// Samples per local weekday, Monday first
    pub weekday_histogram: [usize; 7],
    pub session_count: usize,
    pub average_session_minutes: f64,
    /// Days between the first and last sample
    pub observation_days: f64,
    /// Sessions per week, with the observation window floored at one week
    pub visits_per_week: f64,
}

impl VisitPatterns {
    pub fn from_samples(samples: &[LocationSample], config: &ScorerConfig) -> Self {
        let offset = FixedOffset::east_opt(config.utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix());

        let mut hour_histogram = [0usize; 24];
        let mut weekday_histogram = [0usize; 7];
        for sample in samples {
            let local = sample.timestamp.with_timezone(&offset);
            hour_histogram[local.hour() as usize] += 1;
            weekday_histogram[local.weekday().num_days_from_monday() as usize] += 1;
        }

        let sessions = segment_with(
            samples,
            config.pattern_session_break_minutes,
            config.pattern_min_session_minutes,
        );
        let session_count = sessions.len();
        let average_session_minutes = if sessions.is_empty() {
            0.0
        } else {
            sessions.iter().map(|s| s.duration_minutes()).sum::<f64>() / session_count as f64
        };

        let observation_days = match (
            samples.iter().map(|s| s.timestamp).min(),
            samples.iter().map(|s| s.timestamp).max(),
        ) {
            (Some(first), Some(last)) => (last - first).num_seconds() as f64 / 86_400.0,
            _ => 0.0,
        };
        let weeks = (observation_days / 7.0).max(1.0);

        Self {
            sample_count: samples.len(),
            hour_histogram,
            weekday_histogram,
            session_count,
            average_session_minutes,
            observation_days,
            visits_per_week: session_count as f64 / weeks,
        }
    }

    /// Fraction of samples whose local hour satisfies `in_window`.
    pub fn hour_ratio(&self, in_window: impl Fn(u32) -> bool) -> f64 {
        if self.sample_count == 0 {
            return 0.0;
        }
        let matching: usize = self
            .hour_histogram
            .iter()
            .enumerate()
            .filter(|(hour, _)| in_window(*hour as u32))
            .map(|(_, count)| count)
            .sum();
        matching as f64 / self.sample_count as f64
    }

    /// Fraction of samples taken Monday to Friday.
    pub fn weekday_ratio(&self) -> f64 {
        if self.sample_count == 0 {
            return 0.0;
        }
        let weekdays: usize = self.weekday_histogram[..5].iter().sum();
        weekdays as f64 / self.sample_count as f64
    }
}

/// Evening and night, 20:00 to 06:59.
pub fn is_night_hour(hour: u32) -> bool {
    hour >= 20 || hour < 7
}

/// Office hours, 09:00 to 17:59.
pub fn is_work_hour(hour: u32) -> bool {
    (9..18).contains(&hour)
}

/// School hours, 08:00 to 15:59.
pub fn is_school_hour(hour: u32) -> bool {
    (8..16).contains(&hour)
}

/// Typical workout slots, early morning and after work.
pub fn is_workout_hour(hour: u32) -> bool {
    (5..10).contains(&hour) || (17..22).contains(&hour)
}

/// Lunch and dinner.
pub fn is_meal_hour(hour: u32) -> bool {
    (11..15).contains(&hour) || (18..22).contains(&hour)
}

/// Store opening hours.
pub fn is_shopping_hour(hour: u32) -> bool {
    (10..21).contains(&hour)
}
