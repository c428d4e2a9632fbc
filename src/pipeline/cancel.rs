//! Cooperative cancellation for a single batch.
//!
//! Each batch owns its own token, so a cancellation never leaks into a
//! later batch. The flag only ever flips false → true; workers observe it
//! at stage boundaries rather than being interrupted mid-call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::error::PipelineError;

/// Shared cancellation flag. Cloning is cheap; all clones observe the
/// same state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }

    /// Stage-boundary check: returns `Err(Cancelled)` once the token
    /// has been tripped.
    pub fn checkpoint(&self) -> Result<(), PipelineError> {
        if self.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }
}
