//! Transport-agnostic shared state.
//!
//! `CoreState` owns everything the HTTP layer and the batch pipeline share:
//! the working directories, the single active-batch slot, and the finalized
//! results of the most recent batch. It has no knowledge of axum, so the
//! pipeline can be driven from tests without a server.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;

use crate::pipeline::cancel::CancelToken;
use crate::pipeline::types::VerificationOutcome;

#[derive(Debug, Error)]
pub enum CoreError {
    /// A state mutex was poisoned by a panicking holder.
    #[error("internal state lock poisoned")]
    LockPoisoned,

    /// A second batch was started while one is still running.
    #[error("a verification batch is already running")]
    BatchRunning,
}

/// Bookkeeping for the batch currently in flight. At most one exists.
#[derive(Debug, Clone)]
pub struct ActiveBatch {
    pub batch_id: String,
    pub cancel: CancelToken,
    pub started_at: DateTime<Utc>,
}

pub struct CoreState {
    pub uploads_dir: PathBuf,
    pub artifacts_dir: PathBuf,
    pub pages_dir: PathBuf,
    active: Mutex<Option<ActiveBatch>>,
    /// Results of the most recent batch, filled in as outcomes land;
    /// `None` until the first batch starts. Replaced wholesale by the
    /// next batch.
    results: Mutex<Option<Vec<VerificationOutcome>>>,
}

impl CoreState {
    pub fn new() -> Self {
        Self {
            uploads_dir: crate::config::uploads_dir(),
            artifacts_dir: crate::config::artifacts_dir(),
            pages_dir: crate::config::pages_dir(),
            active: Mutex::new(None),
            results: Mutex::new(None),
        }
    }

    /// All directories rooted under `root` instead of the user's home.
    /// Intended for tests.
    pub fn with_root(root: &Path) -> Self {
        Self {
            uploads_dir: root.join("uploads"),
            artifacts_dir: root.join("results").join("ocr_results"),
            pages_dir: root.join("pages"),
            active: Mutex::new(None),
            results: Mutex::new(None),
        }
    }

    /// Claims the active-batch slot. Fails with `BatchRunning` while a
    /// previous batch has not finished.
    pub fn begin_batch(&self, batch_id: String, cancel: CancelToken) -> Result<(), CoreError> {
        let mut active = self.active.lock().map_err(|_| CoreError::LockPoisoned)?;
        if active.is_some() {
            return Err(CoreError::BatchRunning);
        }
        info!(batch_id = %batch_id, "Batch started");
        *active = Some(ActiveBatch {
            batch_id,
            cancel,
            started_at: Utc::now(),
        });
        Ok(())
    }

    /// Trips the active batch's cancel token. Returns `false` when no
    /// batch is running (cancellation of an idle system is a no-op).
    pub fn cancel_active(&self) -> Result<bool, CoreError> {
        let active = self.active.lock().map_err(|_| CoreError::LockPoisoned)?;
        match active.as_ref() {
            Some(batch) => {
                info!(batch_id = %batch.batch_id, "Cancellation requested");
                batch.cancel.cancel();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Releases the active-batch slot once the batch has fully wound down.
    pub fn clear_active(&self) -> Result<(), CoreError> {
        let mut active = self.active.lock().map_err(|_| CoreError::LockPoisoned)?;
        *active = None;
        Ok(())
    }

    pub fn active_batch(&self) -> Result<Option<ActiveBatch>, CoreError> {
        let active = self.active.lock().map_err(|_| CoreError::LockPoisoned)?;
        Ok(active.clone())
    }

    /// Stores the finished batch's outcomes, replacing any previous set.
    /// Called even after cancellation, so partial results stay exportable.
    pub fn finalize_results(&self, outcomes: Vec<VerificationOutcome>) -> Result<(), CoreError> {
        let mut results = self.results.lock().map_err(|_| CoreError::LockPoisoned)?;
        info!(count = outcomes.len(), "Batch results finalized");
        *results = Some(outcomes);
        Ok(())
    }

    /// Appends one outcome to the current batch's results, so an export
    /// issued mid-batch sees the rows finished so far.
    pub fn push_result(&self, outcome: VerificationOutcome) -> Result<(), CoreError> {
        let mut results = self.results.lock().map_err(|_| CoreError::LockPoisoned)?;
        results.get_or_insert_with(Vec::new).push(outcome);
        Ok(())
    }

    pub fn results_snapshot(&self) -> Result<Option<Vec<VerificationOutcome>>, CoreError> {
        let results = self.results.lock().map_err(|_| CoreError::LockPoisoned)?;
        Ok(results.clone())
    }
}

impl Default for CoreState {
    fn default() -> Self {
        Self::new()
    }
}
