//! Marks verification: transcript vs form comparison via an LLM.

pub mod ollama;

use thiserror::Error;

pub use ollama::{MockVerifier, OllamaVerifier};

use crate::pipeline::types::Verdict;

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] crate::llm::OllamaError),

    /// The model replied with something other than the two expected verdicts.
    #[error("unrecognized verifier output: {0:?}")]
    UnrecognizedOutput(String),
}

/// Compares a candidate's transcript text against their form text and
/// renders a binary verdict. Synchronous and blocking; the scheduler runs
/// it on the blocking thread pool.
pub trait MarksVerifier: Send + Sync {
    fn verify(&self, transcript_text: &str, form_text: &str) -> Result<Verdict, VerificationError>;
}
