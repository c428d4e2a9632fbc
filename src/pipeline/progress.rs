//! Progress aggregation: pipeline messages → client-facing NDJSON events.
//!
//! One aggregator per batch, owned by the single fan-in consumer, so
//! event ordering and the monotonic percentage need no locking. The
//! percentage is a high-water mark over a fixed total: interleaved
//! messages from concurrent candidates can arrive "late" relative to the
//! count, but the reported number never moves backwards.

use serde::Serialize;

use super::types::{PipelineMessage, Verdict};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Processing,
    Result,
    Cancelled,
    Completed,
}

/// One NDJSON line on the /verify stream.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub status: EventStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Verdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f32>,
}

impl ProgressEvent {
    pub fn starting() -> Self {
        Self {
            status: EventStatus::Processing,
            candidate: None,
            message: Some("Starting processing of candidate files".to_string()),
            result: None,
            progress: Some(0.0),
        }
    }

    pub fn completed() -> Self {
        Self {
            status: EventStatus::Completed,
            candidate: None,
            message: Some("All files processed.".to_string()),
            result: None,
            progress: Some(100.0),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            status: EventStatus::Cancelled,
            candidate: None,
            message: Some("Processing cancelled by user request".to_string()),
            result: None,
            progress: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, EventStatus::Cancelled | EventStatus::Completed)
    }
}

/// Folds pipeline messages into progress events.
///
/// `total` is fixed at batch start; `completed` counts candidates that
/// reached a verdict or failed.
pub struct ProgressAggregator {
    total: usize,
    completed: usize,
    high_water: f32,
}

impl ProgressAggregator {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
            high_water: 0.0,
        }
    }

    pub fn completed_count(&self) -> usize {
        self.completed
    }

    /// Clamps a raw percentage to [high-water mark, 100].
    fn clamp(&mut self, raw: f32) -> f32 {
        self.high_water = self.high_water.max(raw.min(100.0));
        self.high_water
    }

    fn percentage(&self, completed: f32) -> f32 {
        if self.total == 0 {
            return 100.0;
        }
        completed / self.total as f32 * 100.0
    }

    pub fn handle(&mut self, message: PipelineMessage) -> ProgressEvent {
        match message {
            PipelineMessage::Started { candidate_id } => ProgressEvent {
                status: EventStatus::Processing,
                message: Some(format!("Processing candidate: {candidate_id}")),
                candidate: Some(candidate_id),
                result: None,
                progress: None,
            },
            PipelineMessage::PageExtracted {
                candidate_id,
                document,
                page,
                total_pages,
            } => {
                ProgressEvent {
                    status: EventStatus::Processing,
                    message: Some(format!(
                        "{candidate_id}: Processing {} page {}/{total_pages}",
                        document.as_str(),
                        page + 1
                    )),
                    candidate: Some(candidate_id),
                    result: None,
                    progress: None,
                }
            }
            PipelineMessage::SectionLocated { candidate_id, page } => {
                let message = match page {
                    Some(page) => format!(
                        "{candidate_id}: Relevant section found at page {}",
                        page + 1
                    ),
                    None => format!(
                        "{candidate_id}: Relevant section not found, continuing with transcript only"
                    ),
                };
                ProgressEvent {
                    status: EventStatus::Processing,
                    message: Some(message),
                    candidate: Some(candidate_id),
                    result: None,
                    progress: None,
                }
            }
            PipelineMessage::ExtractionCompleted { candidate_id } => {
                // Extraction counts as the first half of a candidate's work.
                let raw = self.percentage(self.completed as f32 + 0.5);
                let progress = self.clamp(raw);
                ProgressEvent {
                    status: EventStatus::Processing,
                    message: Some(format!(
                        "{candidate_id}: OCR processing completed, starting verification"
                    )),
                    candidate: Some(candidate_id),
                    result: None,
                    progress: Some(progress),
                }
            }
            PipelineMessage::Verified {
                candidate_id,
                verdict,
            } => {
                self.completed += 1;
                let raw = self.percentage(self.completed as f32);
                let progress = self.clamp(raw);
                ProgressEvent {
                    status: EventStatus::Result,
                    message: None,
                    candidate: Some(candidate_id),
                    result: Some(verdict),
                    progress: Some(progress),
                }
            }
            PipelineMessage::Failed {
                candidate_id,
                detail,
            } => {
                // Failures still advance the batch; they just carry no verdict.
                self.completed += 1;
                let raw = self.percentage(self.completed as f32);
                let progress = self.clamp(raw);
                ProgressEvent {
                    status: EventStatus::Processing,
                    message: Some(format!("{candidate_id} generated an exception: {detail}")),
                    candidate: Some(candidate_id),
                    result: None,
                    progress: Some(progress),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::DocumentKind;

    fn verified(id: &str) -> PipelineMessage {
        PipelineMessage::Verified {
            candidate_id: id.to_string(),
            verdict: Verdict::Verified,
        }
    }

    fn extraction_done(id: &str) -> PipelineMessage {
        PipelineMessage::ExtractionCompleted {
            candidate_id: id.to_string(),
        }
    }

    #[test]
    fn extraction_counts_as_half_a_candidate() {
        let mut agg = ProgressAggregator::new(2);
        let event = agg.handle(extraction_done("A1"));
        assert_eq!(event.progress, Some(25.0));
        assert_eq!(event.status, EventStatus::Processing);
    }

    #[test]
    fn verdict_advances_full_step() {
        let mut agg = ProgressAggregator::new(2);
        agg.handle(extraction_done("A1"));
        let event = agg.handle(verified("A1"));
        assert_eq!(event.status, EventStatus::Result);
        assert_eq!(event.result, Some(Verdict::Verified));
        assert_eq!(event.progress, Some(50.0));

        agg.handle(extraction_done("B2"));
        let event = agg.handle(verified("B2"));
        assert_eq!(event.progress, Some(100.0));
    }

    #[test]
    fn percentage_never_moves_backwards() {
        // Interleaved candidates: B2's verdict lands before A1's
        // half-step, which would otherwise read lower.
        let mut agg = ProgressAggregator::new(2);
        agg.handle(extraction_done("A1"));
        agg.handle(extraction_done("B2"));
        let event = agg.handle(verified("B2"));
        assert_eq!(event.progress, Some(50.0));

        // (completed + 0.5) / 2 = 75% — fine. But a late half-step after
        // two verdicts must clamp to the high-water mark.
        let event = agg.handle(verified("A1"));
        assert_eq!(event.progress, Some(100.0));
        let event = agg.handle(extraction_done("C3"));
        assert_eq!(event.progress, Some(100.0));
    }

    #[test]
    fn failure_advances_progress_without_result() {
        let mut agg = ProgressAggregator::new(2);
        let event = agg.handle(PipelineMessage::Failed {
            candidate_id: "A1".to_string(),
            detail: "render failed".to_string(),
        });
        assert_eq!(event.status, EventStatus::Processing);
        assert_eq!(event.result, None);
        assert_eq!(event.progress, Some(50.0));
        assert_eq!(
            event.message.as_deref(),
            Some("A1 generated an exception: render failed")
        );
    }

    #[test]
    fn page_messages_are_one_based_for_humans() {
        let mut agg = ProgressAggregator::new(1);
        let event = agg.handle(PipelineMessage::PageExtracted {
            candidate_id: "A1".to_string(),
            document: DocumentKind::Transcript,
            page: 0,
            total_pages: 3,
        });
        assert_eq!(
            event.message.as_deref(),
            Some("A1: Processing transcript page 1/3")
        );
    }

    #[test]
    fn section_messages_cover_both_outcomes() {
        let mut agg = ProgressAggregator::new(1);
        let found = agg.handle(PipelineMessage::SectionLocated {
            candidate_id: "A1".to_string(),
            page: Some(2),
        });
        assert_eq!(
            found.message.as_deref(),
            Some("A1: Relevant section found at page 3")
        );
        let missing = agg.handle(PipelineMessage::SectionLocated {
            candidate_id: "A1".to_string(),
            page: None,
        });
        assert!(missing.message.unwrap().contains("not found"));
    }

    #[test]
    fn serialization_drops_absent_fields() {
        let mut agg = ProgressAggregator::new(1);
        let event = agg.handle(PipelineMessage::Started {
            candidate_id: "A1".to_string(),
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"status\":\"processing\""));
        assert!(!json.contains("result"));
        assert!(!json.contains("progress"));

        let event = agg.handle(verified("A1"));
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"status\":\"result\""));
        assert!(json.contains("\"result\":\"Verified\""));
        assert!(json.contains("\"progress\":100.0"));
    }

    #[test]
    fn terminal_constructors() {
        assert!(ProgressEvent::completed().is_terminal());
        assert!(ProgressEvent::cancelled().is_terminal());
        assert!(!ProgressEvent::starting().is_terminal());
        assert_eq!(ProgressEvent::completed().progress, Some(100.0));
    }

    #[test]
    fn zero_total_reports_full_progress() {
        let mut agg = ProgressAggregator::new(0);
        let event = agg.handle(verified("ghost"));
        assert_eq!(event.progress, Some(100.0));
    }
}
