//! Unified error handling for place detection.
//!
//! The pure pipeline stages (filtering, clustering, segmentation, scoring)
//! never fail: degenerate input produces empty output. Errors only come from
//! the stateful edges of the crate: the single-flight detector, the
//! collaborator stores and category parsing during correction replay.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, PlaceMatchError>;

#[derive(Debug, Error)]
pub enum PlaceMatchError {
    /// A detection pass was requested while another one is still running.
    #[error("a detection pass is already in progress")]
    AlreadyRunning,

    /// The caller cancelled the pass; no places were committed.
    #[error("detection pass cancelled after {clusters_planned} clusters were planned")]
    Cancelled { clusters_planned: usize },

    /// A collaborator store rejected an operation.
    #[error("store operation '{operation}' failed: {message}")]
    Store { operation: String, message: String },

    /// A category name could not be parsed.
    #[error("unknown place category '{0}'")]
    UnknownCategory(String),

    /// A sample has unusable coordinates or accuracy.
    #[error("invalid sample at index {index}: {reason}")]
    InvalidSample { index: usize, reason: String },
}

impl PlaceMatchError {
    /// Build a store error from any displayable cause.
    pub fn store(operation: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::Store {
            operation: operation.into(),
            message: cause.to_string(),
        }
    }
}

/// Extension trait for turning options into typed errors.
pub trait OptionExt<T> {
    fn ok_or_unknown_category(self, name: &str) -> Result<T>;
    fn ok_or_place_missing(self, place_id: &uuid::Uuid) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_unknown_category(self, name: &str) -> Result<T> {
        self.ok_or_else(|| PlaceMatchError::UnknownCategory(name.to_string()))
    }

    fn ok_or_place_missing(self, place_id: &uuid::Uuid) -> Result<T> {
        self.ok_or_else(|| PlaceMatchError::store("find_place", format!("place {place_id} not found")))
    }
}
