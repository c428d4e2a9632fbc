//! Batch verification endpoints: start (streaming) and cancel.

use axum::body::{Body, Bytes};
use axum::extract::{Multipart, State};
use axum::http::header;
use axum::response::Response;
use axum::Json;
use serde::Serialize;
use tracing::{debug, info};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::pipeline::cleanup::remove_dir_contents;
use crate::pipeline::matcher::match_candidates;
use crate::pipeline::{new_batch_id, run_batch, BatchConfig, BatchRun, CancelToken};

/// Strips path components and anything outside a conservative character
/// set, so an uploaded filename can never escape the uploads directory.
fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    base.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect()
}

/// POST /verify — multipart upload, NDJSON progress stream response.
///
/// Field names are `transcripts` and `forms`, one file per part. The
/// response body stays open for the lifetime of the batch; the client
/// dropping the connection cancels it.
pub async fn start_verification(
    State(ctx): State<ApiContext>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let batch_id = new_batch_id();
    let cancel = CancelToken::new();
    // Claim the single-batch slot before touching the upload directories.
    // A request rejected with 409 must leave the running batch's files alone.
    ctx.core.begin_batch(batch_id.clone(), cancel.clone())?;

    let (items, transcripts_dir, forms_dir) = match stage_batch_inputs(&ctx, multipart).await {
        Ok(staged) => staged,
        Err(e) => {
            let _ = ctx.core.clear_active();
            return Err(e);
        }
    };
    info!(batch_id = %batch_id, candidates = items.len(), "Verification batch accepted");

    let run = BatchRun {
        batch_id,
        items,
        cancel,
        config: BatchConfig {
            max_concurrent: ctx.config.max_concurrent_candidates,
            marker_phrase: ctx.config.marker_phrase.clone(),
            form_window_pages: ctx.config.form_window_pages,
            adapter_max_retries: ctx.config.adapter_max_retries,
            adapter_retry_backoff_ms: ctx.config.adapter_retry_backoff_ms,
            artifacts_dir: ctx.core.artifacts_dir.clone(),
            cleanup_dirs: vec![
                transcripts_dir,
                forms_dir,
                ctx.core.artifacts_dir.clone(),
                ctx.core.pages_dir.clone(),
            ],
        },
    };
    let rx = run_batch(run, ctx.adapters.clone(), ctx.core.clone());

    // One NDJSON line per event; the stream ends when the batch does.
    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        let mut line = serde_json::to_vec(&event).unwrap_or_default();
        line.push(b'\n');
        Some((Ok::<_, std::convert::Infallible>(Bytes::from(line)), rx))
    });

    Response::builder()
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// Sweeps the upload staging directories, saves the multipart body, and
/// matches the files into work items. Only called with the batch slot
/// already held, so the sweep can never hit a live batch's inputs.
async fn stage_batch_inputs(
    ctx: &ApiContext,
    mut multipart: Multipart,
) -> Result<(Vec<crate::pipeline::WorkItem>, std::path::PathBuf, std::path::PathBuf), ApiError> {
    let transcripts_dir = ctx.core.uploads_dir.join("transcripts");
    let forms_dir = ctx.core.uploads_dir.join("forms");
    for dir in [&transcripts_dir, &forms_dir] {
        std::fs::create_dir_all(dir)
            .map_err(|e| ApiError::Internal(format!("cannot create upload dir: {e}")))?;
        // Stale files from an interrupted batch must not join this one.
        remove_dir_contents(dir);
    }

    let mut transcript_count = 0usize;
    let mut form_count = 0usize;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        let Some(field_name) = field.name().map(str::to_string) else {
            continue;
        };
        let target_dir = match field_name.as_str() {
            "transcripts" => &transcripts_dir,
            "forms" => &forms_dir,
            other => {
                debug!(field = other, "Ignoring unknown multipart field");
                continue;
            }
        };

        let file_name = sanitize_filename(field.file_name().unwrap_or_default());
        if file_name.is_empty() {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read upload: {e}")))?;
        std::fs::write(target_dir.join(&file_name), &bytes)
            .map_err(|e| ApiError::Internal(format!("cannot save upload: {e}")))?;
        debug!(file = %file_name, field = %field_name, size = bytes.len(), "Saved uploaded file");
        match field_name.as_str() {
            "transcripts" => transcript_count += 1,
            _ => form_count += 1,
        }
    }

    if transcript_count == 0 || form_count == 0 {
        return Err(ApiError::BadRequest(
            "Both transcripts and forms must be uploaded".to_string(),
        ));
    }

    let items = match_candidates(&transcripts_dir, &forms_dir)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok((items, transcripts_dir, forms_dir))
}

#[derive(Serialize)]
pub struct CancelResponse {
    /// `true` when a running batch was told to stop.
    pub acknowledged: bool,
}

/// POST /cancel — request cancellation of the running batch.
pub async fn cancel_verification(
    State(ctx): State<ApiContext>,
) -> Result<Json<CancelResponse>, ApiError> {
    let acknowledged = ctx.core.cancel_active()?;
    Ok(Json(CancelResponse { acknowledged }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_path_traversal() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("..\\..\\boot.ini"), "boot.ini");
        assert_eq!(sanitize_filename("Transcript_A1.pdf"), "Transcript_A1.pdf");
    }

    #[test]
    fn sanitize_drops_odd_characters() {
        assert_eq!(sanitize_filename("Forms_A 1;_form.pdf"), "Forms_A1_form.pdf");
        assert_eq!(sanitize_filename("\u{202e}fdp.A_tpircsnarT"), "fdp.A_tpircsnarT");
    }

    #[test]
    fn sanitize_can_produce_empty_name() {
        assert_eq!(sanitize_filename("///"), "");
        assert_eq!(sanitize_filename(""), "");
    }
}
