//! Errors raised inside a candidate pipeline.

use thiserror::Error;

use crate::extraction::ExtractionError;
use crate::verification::VerificationError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("verification failed: {0}")]
    Verification(#[from] VerificationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The batch was cancelled while this candidate was in flight.
    #[error("cancelled")]
    Cancelled,

    #[error("batch setup failed: {0}")]
    Setup(String),
}

impl PipelineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
