//! Batch scheduler: bounded-concurrency fan-out, single-consumer fan-in.
//!
//! Candidate pipelines run on the blocking pool behind a semaphore.
//! All of their messages funnel into one consumer task that owns the
//! progress aggregator and the result store, so neither needs a lock.
//! The consumer is also the only writer of the outbound event stream,
//! which guarantees exactly one terminal event per batch.

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::candidate::{run_candidate, CandidateAdapters};
use super::cleanup::spawn_cleanup;
use super::progress::{ProgressAggregator, ProgressEvent};
use super::store::ResultStore;
use super::types::{BatchConfig, PipelineMessage, WorkItem};
use crate::core_state::CoreState;

/// Channel capacity for both the message and event channels. Workers
/// block on a full channel, which throttles them to consumer speed.
const CHANNEL_CAPACITY: usize = 64;

pub fn new_batch_id() -> String {
    Uuid::new_v4().to_string()
}

/// Everything a batch needs to run. The cancel token is shared with
/// `CoreState` so /cancel can reach the in-flight batch.
pub struct BatchRun {
    pub batch_id: String,
    pub items: Vec<WorkItem>,
    pub cancel: super::cancel::CancelToken,
    pub config: BatchConfig,
}

/// Launches the batch and returns the outbound event stream.
///
/// The receiver yields one `ProgressEvent` per NDJSON line and closes
/// after the terminal event. Dropping the receiver cancels the batch.
/// Must be called from within a tokio runtime.
pub fn run_batch(
    run: BatchRun,
    adapters: CandidateAdapters,
    core: Arc<CoreState>,
) -> mpsc::Receiver<ProgressEvent> {
    let BatchRun {
        batch_id,
        items,
        cancel,
        config,
    } = run;

    let total = items.len();
    info!(batch_id = %batch_id, candidates = total, max_concurrent = config.max_concurrent, "Batch scheduled");

    let (msg_tx, mut msg_rx) = mpsc::channel::<PipelineMessage>(CHANNEL_CAPACITY);
    let (event_tx, event_rx) = mpsc::channel::<ProgressEvent>(CHANNEL_CAPACITY);

    // ── Fan-out ────────────────────────────────────────────

    let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
    let mut worker_handles = Vec::with_capacity(total);
    for item in items {
        let semaphore = Arc::clone(&semaphore);
        let adapters = adapters.clone();
        let config = config.clone();
        let cancel = cancel.clone();
        let msg_tx = msg_tx.clone();

        worker_handles.push(tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            // Cancelled while queued: never start the pipeline.
            if cancel.is_cancelled() {
                debug!(candidate_id = %item.candidate_id, "Candidate skipped, batch cancelled");
                return;
            }

            let candidate_id = item.candidate_id.clone();
            let worker_tx = msg_tx.clone();
            let result = tokio::task::spawn_blocking(move || {
                run_candidate(&item, &adapters, &config, &cancel, &worker_tx)
            })
            .await;

            match result {
                Ok(Ok(_outcome)) => {}
                Ok(Err(e)) if e.is_cancelled() => {
                    debug!(candidate_id = %candidate_id, "Candidate cancelled");
                }
                Ok(Err(e)) => {
                    let _ = msg_tx
                        .send(PipelineMessage::Failed {
                            candidate_id,
                            detail: e.to_string(),
                        })
                        .await;
                }
                Err(join_error) => {
                    error!(candidate_id = %candidate_id, error = %join_error, "Candidate task panicked");
                    let _ = msg_tx
                        .send(PipelineMessage::Failed {
                            candidate_id,
                            detail: "internal processing failure".to_string(),
                        })
                        .await;
                }
            }
        }));
    }
    // Workers hold the remaining senders; the channel closes once the
    // last worker finishes.
    drop(msg_tx);

    // ── Fan-in ─────────────────────────────────────────────

    tokio::spawn(async move {
        let mut aggregator = ProgressAggregator::new(total);
        let mut store = ResultStore::new();

        // The previous batch's results are replaced wholesale, so an
        // export during this batch sees only this batch's rows.
        if let Err(e) = core.finalize_results(Vec::new()) {
            error!(batch_id = %batch_id, error = %e, "Failed to reset result store");
        }

        if event_tx.send(ProgressEvent::starting()).await.is_err() {
            cancel.cancel();
        }

        while let Some(message) = msg_rx.recv().await {
            if cancel.is_cancelled() {
                break;
            }
            debug!(candidate_id = message.candidate_id(), stage = %message.stage(), "Pipeline message");
            if let PipelineMessage::Verified {
                candidate_id,
                verdict,
            } = &message
            {
                let outcome = super::types::VerificationOutcome {
                    candidate_id: candidate_id.clone(),
                    verdict: *verdict,
                };
                if store.push(outcome.clone()) {
                    if let Err(e) = core.push_result(outcome) {
                        error!(batch_id = %batch_id, error = %e, "Failed to publish outcome");
                    }
                }
            }
            let event = aggregator.handle(message);
            if event_tx.send(event).await.is_err() {
                // Client went away; stop the batch.
                warn!(batch_id = %batch_id, "Event stream closed by client, cancelling batch");
                cancel.cancel();
                break;
            }
        }

        // Closing the message channel fails any worker still mid-send,
        // which reads as cancellation on their side.
        drop(msg_rx);

        let terminal = if cancel.is_cancelled() {
            ProgressEvent::cancelled()
        } else {
            ProgressEvent::completed()
        };
        let _ = event_tx.send(terminal).await;

        // A cancelled worker can still be inside a blocking adapter call
        // that writes transient files. Sweep only once they have all
        // returned, or the sweep would race their late writes.
        for handle in worker_handles {
            let _ = handle.await;
        }
        spawn_cleanup(config.cleanup_dirs.clone());

        // Authoritative final set; partial results stay exportable after
        // cancellation.
        if let Err(e) = core.finalize_results(store.into_outcomes()) {
            error!(batch_id = %batch_id, error = %e, "Failed to finalize batch results");
        }
        if let Err(e) = core.clear_active() {
            error!(batch_id = %batch_id, error = %e, "Failed to release batch slot");
        }
        info!(batch_id = %batch_id, cancelled = cancel.is_cancelled(), "Batch finished");
    });

    event_rx
}
