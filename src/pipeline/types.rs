//! Core types for the verification batch pipeline.
//!
//! These types model the full lifecycle:
//! Matching → Extraction → Section location → Verification → Result store.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════
// Work item (output of the matcher)
// ═══════════════════════════════════════════

/// One matched candidate's pair of documents, queued for processing.
/// Immutable; owned by exactly one candidate pipeline until it finishes.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub candidate_id: String,
    pub transcript_path: PathBuf,
    pub form_path: PathBuf,
}

// ═══════════════════════════════════════════
// Pipeline stages
// ═══════════════════════════════════════════

/// Stages of one candidate pipeline. Transitions are strictly forward;
/// `Failed` and `Cancelled` are absorbing and reachable from any
/// non-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Matched,
    ExtractingTranscript,
    LocatingRelevantSection,
    ExtractingForm,
    Verifying,
    Completed,
    Failed,
    Cancelled,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Matched => "matched",
            Self::ExtractingTranscript => "extracting_transcript",
            Self::LocatingRelevantSection => "locating_relevant_section",
            Self::ExtractingForm => "extracting_form",
            Self::Verifying => "verifying",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ═══════════════════════════════════════════
// Documents
// ═══════════════════════════════════════════

/// Which of the candidate's two documents a message refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Transcript,
    Form,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transcript => "transcript",
            Self::Form => "form",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ═══════════════════════════════════════════
// Verdict & outcome
// ═══════════════════════════════════════════

/// Binary verification outcome. Wire form matches the verifier's vocabulary
/// ("Verified" / "Not Verified").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Verified,
    #[serde(rename = "Not Verified")]
    NotVerified,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "Verified",
            Self::NotVerified => "Not Verified",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Finalized per-candidate outcome, appended to the batch result store.
/// Immutable once created; at most one per candidate per batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub candidate_id: String,
    pub verdict: Verdict,
}

// ═══════════════════════════════════════════
// Pipeline messages (worker → fan-in consumer)
// ═══════════════════════════════════════════

/// Tagged notification emitted by a running candidate pipeline.
/// Consumed exactly once by the progress aggregator; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineMessage {
    Started {
        candidate_id: String,
    },
    PageExtracted {
        candidate_id: String,
        document: DocumentKind,
        /// Zero-based page index.
        page: usize,
        total_pages: usize,
    },
    SectionLocated {
        candidate_id: String,
        /// Zero-based page index of the marker, if found.
        page: Option<usize>,
    },
    ExtractionCompleted {
        candidate_id: String,
    },
    Verified {
        candidate_id: String,
        verdict: Verdict,
    },
    Failed {
        candidate_id: String,
        detail: String,
    },
}

impl PipelineMessage {
    /// The stage a candidate has reached when this message is emitted.
    pub fn stage(&self) -> PipelineStage {
        match self {
            Self::Started { .. } => PipelineStage::Matched,
            Self::PageExtracted {
                document: DocumentKind::Transcript,
                ..
            } => PipelineStage::ExtractingTranscript,
            Self::PageExtracted {
                document: DocumentKind::Form,
                ..
            } => PipelineStage::ExtractingForm,
            Self::SectionLocated { .. } => PipelineStage::LocatingRelevantSection,
            Self::ExtractionCompleted { .. } => PipelineStage::Verifying,
            Self::Verified { .. } => PipelineStage::Completed,
            Self::Failed { .. } => PipelineStage::Failed,
        }
    }

    pub fn candidate_id(&self) -> &str {
        match self {
            Self::Started { candidate_id }
            | Self::PageExtracted { candidate_id, .. }
            | Self::SectionLocated { candidate_id, .. }
            | Self::ExtractionCompleted { candidate_id }
            | Self::Verified { candidate_id, .. }
            | Self::Failed { candidate_id, .. } => candidate_id,
        }
    }
}

// ═══════════════════════════════════════════
// Batch configuration
// ═══════════════════════════════════════════

/// Per-batch slice of the runtime configuration, plus the directories the
/// batch writes to (and must clean up).
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum candidate pipelines running concurrently.
    pub max_concurrent: usize,
    /// Phrase locating the relevant form section.
    pub marker_phrase: String,
    /// Pages extracted after the marker page.
    pub form_window_pages: usize,
    /// Retries per adapter call before the candidate is failed.
    pub adapter_max_retries: u32,
    /// Base backoff between retries, doubled per attempt.
    pub adapter_retry_backoff_ms: u64,
    /// Where per-candidate combined-text artifacts are written.
    pub artifacts_dir: PathBuf,
    /// Transient directories swept after completion or cancellation.
    pub cleanup_dirs: Vec<PathBuf>,
}

impl BatchConfig {
    pub fn from_app(config: &crate::config::AppConfig) -> Self {
        Self {
            max_concurrent: config.max_concurrent_candidates,
            marker_phrase: config.marker_phrase.clone(),
            form_window_pages: config.form_window_pages,
            adapter_max_retries: config.adapter_max_retries,
            adapter_retry_backoff_ms: config.adapter_retry_backoff_ms,
            artifacts_dir: crate::config::artifacts_dir(),
            cleanup_dirs: vec![
                crate::config::uploads_dir(),
                crate::config::artifacts_dir(),
                crate::config::pages_dir(),
            ],
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self::from_app(&crate::config::AppConfig::default())
    }
}
