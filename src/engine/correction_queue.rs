//! Queue of user corrections awaiting replay into the learner.

use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use crate::learning::UserCorrection;
use crate::{PlaceMatchError, Result};

pub trait CorrectionQueue: Send + Sync {
    /// Corrections not yet marked applied, in arrival order.
    fn unapplied(&self) -> Result<Vec<UserCorrection>>;

    fn mark_applied(&self, correction_id: Uuid) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryCorrectionQueue {
    corrections: Mutex<Vec<UserCorrection>>,
}

impl InMemoryCorrectionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_corrections(corrections: Vec<UserCorrection>) -> Self {
        Self {
            corrections: Mutex::new(corrections),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<UserCorrection>> {
        self.corrections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, correction: UserCorrection) {
        self.lock().push(correction);
    }

    /// Every correction, applied or not.
    pub fn all(&self) -> Vec<UserCorrection> {
        self.lock().clone()
    }

    pub fn pending_count(&self) -> usize {
        self.lock().iter().filter(|c| !c.applied).count()
    }
}

impl CorrectionQueue for InMemoryCorrectionQueue {
    fn unapplied(&self) -> Result<Vec<UserCorrection>> {
        Ok(self.lock().iter().filter(|c| !c.applied).cloned().collect())
    }

    fn mark_applied(&self, correction_id: Uuid) -> Result<()> {
        let mut corrections = self.lock();
        let correction = corrections
            .iter_mut()
            .find(|c| c.id == correction_id)
            .ok_or_else(|| {
                PlaceMatchError::store(
                    "mark_applied",
                    format!("correction {correction_id} not found"),
                )
            })?;
        correction.applied = true;
        Ok(())
    }
}
