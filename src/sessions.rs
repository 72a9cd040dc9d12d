//! Visit session segmentation.
//!
//! A cluster can represent many separate stays at the same place. Sessions
//! split the cluster's samples wherever the gap between consecutive samples
//! is strictly longer than the break threshold.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::{LocationSample, Visit};

/// A contiguous stay, bounded by its first and last sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub sample_count: usize,
}

impl Session {
    pub fn duration(&self) -> Duration {
        self.exit_time - self.entry_time
    }

    pub fn duration_minutes(&self) -> f64 {
        self.duration().num_seconds() as f64 / 60.0
    }

    /// Turn the session into a closed visit at `place_id`.
    pub fn into_visit(self, place_id: Uuid) -> Visit {
        Visit::new(place_id, self.entry_time, Some(self.exit_time))
    }
}

/// Split samples into sessions.
///
/// Samples are sorted by time first. Sessions shorter than
/// `min_visit_duration_minutes` are dropped.
pub fn segment_sessions(samples: &[LocationSample], config: &SessionConfig) -> Vec<Session> {
    let config = config.sanitized();
    segment_with(
        samples,
        config.session_break_minutes,
        config.min_visit_duration_minutes,
    )
}

/// Segmentation with explicit thresholds in minutes.
pub(crate) fn segment_with(
    samples: &[LocationSample],
    break_minutes: f64,
    min_duration_minutes: f64,
) -> Vec<Session> {
    if samples.is_empty() {
        return Vec::new();
    }

    let mut times: Vec<DateTime<Utc>> = samples.iter().map(|s| s.timestamp).collect();
    times.sort();

    let break_secs = break_minutes * 60.0;
    let min_secs = min_duration_minutes * 60.0;

    let mut sessions = Vec::new();
    let mut entry = times[0];
    let mut prev = times[0];
    let mut count = 1usize;

    for &t in times.iter().skip(1) {
        let gap_secs = (t - prev).num_milliseconds() as f64 / 1000.0;
        if gap_secs > break_secs {
            push_if_long_enough(&mut sessions, entry, prev, count, min_secs);
            entry = t;
            count = 0;
        }
        prev = t;
        count += 1;
    }
    push_if_long_enough(&mut sessions, entry, prev, count, min_secs);

    sessions
}

fn push_if_long_enough(
    sessions: &mut Vec<Session>,
    entry: DateTime<Utc>,
    exit: DateTime<Utc>,
    sample_count: usize,
    min_secs: f64,
) {
    let duration_secs = (exit - entry).num_milliseconds() as f64 / 1000.0;
    if duration_secs >= min_secs {
        sessions.push(Session {
            entry_time: entry,
            exit_time: exit,
            sample_count,
        });
    }
}
