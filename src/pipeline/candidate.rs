//! Per-candidate processing: extraction → section location → verification.
//!
//! Runs on the blocking thread pool. Progress is reported through a
//! bounded channel back to the batch consumer; cancellation is observed
//! at stage boundaries, so an in-flight model call always runs to
//! completion before the candidate winds down.

use std::io::Write as _;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::cancel::CancelToken;
use super::error::PipelineError;
use super::types::{BatchConfig, DocumentKind, PipelineMessage, VerificationOutcome, WorkItem};
use crate::extraction::TextExtractor;
use crate::verification::MarksVerifier;

/// The two adapters a candidate pipeline calls out to.
#[derive(Clone)]
pub struct CandidateAdapters {
    pub extractor: Arc<dyn TextExtractor>,
    pub verifier: Arc<dyn MarksVerifier>,
}

pub type MessageSender = tokio::sync::mpsc::Sender<PipelineMessage>;

/// Sends a progress message from blocking context. A closed channel means
/// the consumer is gone, which only happens when the batch is being torn
/// down — treated as cancellation.
fn emit(tx: &MessageSender, message: PipelineMessage) -> Result<(), PipelineError> {
    tx.blocking_send(message)
        .map_err(|_| PipelineError::Cancelled)
}

/// Retries `op` with doubling backoff. Cancellation short-circuits
/// between attempts; the final error is returned unwrapped.
fn with_retry<T, E>(
    max_retries: u32,
    backoff_ms: u64,
    cancel: &CancelToken,
    mut op: impl FnMut() -> Result<T, E>,
) -> Result<T, E>
where
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_retries && !cancel.is_cancelled() => {
                let delay = backoff_ms << attempt;
                warn!(attempt = attempt + 1, delay_ms = delay, error = %e, "Adapter call failed, retrying");
                std::thread::sleep(std::time::Duration::from_millis(delay));
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Drives one candidate through the full state machine.
///
/// On success the combined-text artifact sits in `config.artifacts_dir`
/// with the verdict appended, and the outcome is returned for the store.
pub fn run_candidate(
    item: &WorkItem,
    adapters: &CandidateAdapters,
    config: &BatchConfig,
    cancel: &CancelToken,
    tx: &MessageSender,
) -> Result<VerificationOutcome, PipelineError> {
    let candidate_id = item.candidate_id.as_str();
    let _span = tracing::info_span!("candidate", candidate_id).entered();

    emit(
        tx,
        PipelineMessage::Started {
            candidate_id: candidate_id.to_string(),
        },
    )?;
    cancel.checkpoint()?;

    // ── Transcript extraction ──────────────────────────────

    let transcript_pages = with_retry(
        config.adapter_max_retries,
        config.adapter_retry_backoff_ms,
        cancel,
        || adapters.extractor.page_count(&item.transcript_path),
    )?;

    let mut transcript_text = String::new();
    for page in 0..transcript_pages {
        cancel.checkpoint()?;
        let text = with_retry(
            config.adapter_max_retries,
            config.adapter_retry_backoff_ms,
            cancel,
            || adapters.extractor.extract_text(&item.transcript_path, page),
        )?;
        transcript_text.push_str(&format!("Page {}:\n{}\n\n", page + 1, text));
        emit(
            tx,
            PipelineMessage::PageExtracted {
                candidate_id: candidate_id.to_string(),
                document: DocumentKind::Transcript,
                page,
                total_pages: transcript_pages,
            },
        )?;
    }

    // ── Form section location + extraction ─────────────────

    cancel.checkpoint()?;
    let form_pages = with_retry(
        config.adapter_max_retries,
        config.adapter_retry_backoff_ms,
        cancel,
        || adapters.extractor.page_count(&item.form_path),
    )?;

    let marker_page = with_retry(
        config.adapter_max_retries,
        config.adapter_retry_backoff_ms,
        cancel,
        || adapters.extractor.locate_marker(&item.form_path, &config.marker_phrase),
    )?;
    emit(
        tx,
        PipelineMessage::SectionLocated {
            candidate_id: candidate_id.to_string(),
            page: marker_page,
        },
    )?;

    let mut form_text = String::new();
    if let Some(start) = marker_page {
        // Marker page plus the configured window, bounded by document length.
        let end = (start + config.form_window_pages + 1).min(form_pages);
        for page in start..end {
            cancel.checkpoint()?;
            let text = with_retry(
                config.adapter_max_retries,
                config.adapter_retry_backoff_ms,
                cancel,
                || adapters.extractor.extract_text(&item.form_path, page),
            )?;
            form_text.push_str(&format!("Page {}:\n{}\n\n", page + 1, text));
            emit(
                tx,
                PipelineMessage::PageExtracted {
                    candidate_id: candidate_id.to_string(),
                    document: DocumentKind::Form,
                    page,
                    total_pages: form_pages,
                },
            )?;
        }
    } else {
        debug!(candidate_id, "Marker phrase not found in form, verifying with transcript only");
    }

    // ── Artifact ───────────────────────────────────────────

    std::fs::create_dir_all(&config.artifacts_dir)?;
    let artifact_path = config.artifacts_dir.join(format!("{candidate_id}.txt"));
    std::fs::write(
        &artifact_path,
        format!("# Marksheets -\n\n{transcript_text}\n\n# Forms\n\n{form_text}"),
    )?;

    emit(
        tx,
        PipelineMessage::ExtractionCompleted {
            candidate_id: candidate_id.to_string(),
        },
    )?;
    cancel.checkpoint()?;

    // ── Verification ───────────────────────────────────────

    let verdict = with_retry(
        config.adapter_max_retries,
        config.adapter_retry_backoff_ms,
        cancel,
        || adapters.verifier.verify(&transcript_text, &form_text),
    )?;

    emit(
        tx,
        PipelineMessage::Verified {
            candidate_id: candidate_id.to_string(),
            verdict,
        },
    )?;

    let mut artifact = std::fs::OpenOptions::new().append(true).open(&artifact_path)?;
    write!(artifact, "\n\nVerification Result: {verdict}")?;

    info!(candidate_id, verdict = %verdict, "Candidate verification complete");
    Ok(VerificationOutcome {
        candidate_id: candidate_id.to_string(),
        verdict,
    })
}
