//! CSV export of the most recent batch's results.

use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::Response;
use tracing::info;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::pipeline::store::to_csv;

/// GET /export-csv — download the finalized results as an attachment.
///
/// Covers the most recent batch, finished or in flight (an in-flight
/// batch exports the rows completed so far); 400 before any batch has
/// ever started.
pub async fn export_csv(State(ctx): State<ApiContext>) -> Result<Response, ApiError> {
    let outcomes = ctx
        .core
        .results_snapshot()?
        .ok_or(ApiError::NoResults)?;

    info!(rows = outcomes.len(), "Exporting verification results as CSV");
    let csv = to_csv(&outcomes);

    Response::builder()
        .header(header::CONTENT_TYPE, "text/csv")
        .header(
            header::CONTENT_DISPOSITION,
            "attachment; filename=verification_results.csv",
        )
        .body(Body::from(csv))
        .map_err(|e| ApiError::Internal(e.to_string()))
}
