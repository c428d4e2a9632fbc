//! Verification API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! CORS is permissive: the bundled frontend is served from a different
//! origin during development.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;

/// Build the verification API router.
///
/// Handlers receive `ApiContext` via `State`; `.with_state()` converts
/// `Router<ApiContext>` → `Router<()>` so it mounts anywhere.
pub fn verification_router(ctx: ApiContext) -> Router {
    Router::new()
        .route("/verify", post(endpoints::verify::start_verification))
        .route("/cancel", post(endpoints::verify::cancel_verification))
        .route("/export-csv", get(endpoints::export::export_csv))
        .route("/health", get(endpoints::health::health))
        .with_state(ctx)
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::test_support::mock_context;
    use crate::pipeline::types::{Verdict, VerificationOutcome};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "test-boundary-7f93a1";

    fn multipart_body(parts: &[(&str, &str, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (field, filename, content) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(b"Content-Type: application/pdf\r\n\r\n");
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn verify_request(parts: &[(&str, &str, &[u8])]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/verify")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let dir = TempDir::new().unwrap();
        let app = verification_router(mock_context(dir.path(), Verdict::Verified));

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn cancel_with_no_batch_is_not_acknowledged() {
        let dir = TempDir::new().unwrap();
        let app = verification_router(mock_context(dir.path(), Verdict::Verified));

        let response = app
            .oneshot(
                Request::post("/cancel").body(Body::empty()).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["acknowledged"], false);
    }

    #[tokio::test]
    async fn export_before_any_batch_is_400() {
        let dir = TempDir::new().unwrap();
        let app = verification_router(mock_context(dir.path(), Verdict::Verified));

        let response = app
            .oneshot(Request::get("/export-csv").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "NO_RESULTS");
    }

    #[tokio::test]
    async fn export_after_results_returns_csv_attachment() {
        let dir = TempDir::new().unwrap();
        let ctx = mock_context(dir.path(), Verdict::Verified);
        ctx.core
            .finalize_results(vec![VerificationOutcome {
                candidate_id: "A1".into(),
                verdict: Verdict::NotVerified,
            }])
            .unwrap();
        let app = verification_router(ctx);

        let response = app
            .oneshot(Request::get("/export-csv").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/csv"
        );
        assert_eq!(
            response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=verification_results.csv"
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"Candidate,Result\nA1,Not Verified\n");
    }

    #[tokio::test]
    async fn verify_without_forms_is_400() {
        let dir = TempDir::new().unwrap();
        let app = verification_router(mock_context(dir.path(), Verdict::Verified));

        let response = app
            .oneshot(verify_request(&[(
                "transcripts",
                "Transcript_A1.pdf",
                b"%PDF",
            )]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn verify_streams_ndjson_ending_in_completed() {
        let dir = TempDir::new().unwrap();
        let ctx = mock_context(dir.path(), Verdict::Verified);
        let app = verification_router(ctx.clone());

        let response = app
            .oneshot(verify_request(&[
                ("transcripts", "Transcript_A1.pdf", b"%PDF"),
                ("transcripts", "Transcript_B2.pdf", b"%PDF"),
                ("forms", "Forms_A1_form.pdf", b"%PDF"),
                ("forms", "Forms_B2_form.pdf", b"%PDF"),
            ]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/x-ndjson"
        );

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let lines: Vec<serde_json::Value> = std::str::from_utf8(&body)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(lines.first().unwrap()["status"], "processing");
        assert_eq!(lines.last().unwrap()["status"], "completed");
        assert_eq!(lines.last().unwrap()["progress"], 100.0);
        let results: Vec<_> = lines
            .iter()
            .filter(|l| l["status"] == "result")
            .collect();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|l| l["result"] == "Verified"));

        // The finished batch left exportable results behind.
        assert_eq!(ctx.core.results_snapshot().unwrap().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn second_verify_while_running_is_409() {
        let dir = TempDir::new().unwrap();
        let ctx = mock_context(dir.path(), Verdict::Verified);
        // Occupy the batch slot as if a batch were mid-flight.
        ctx.core
            .begin_batch("busy".into(), crate::pipeline::CancelToken::new())
            .unwrap();
        let app = verification_router(ctx);

        let response = app
            .oneshot(verify_request(&[
                ("transcripts", "Transcript_A1.pdf", b"%PDF"),
                ("forms", "Forms_A1_form.pdf", b"%PDF"),
            ]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn rejected_verify_leaves_running_batch_uploads_intact() {
        let dir = TempDir::new().unwrap();
        let ctx = mock_context(dir.path(), Verdict::Verified);
        // A batch is mid-flight and still reading its uploaded files.
        ctx.core
            .begin_batch("busy".into(), crate::pipeline::CancelToken::new())
            .unwrap();
        let live_file = ctx
            .core
            .uploads_dir
            .join("transcripts")
            .join("Transcript_LIVE.pdf");
        std::fs::create_dir_all(live_file.parent().unwrap()).unwrap();
        std::fs::write(&live_file, b"%PDF").unwrap();
        let app = verification_router(ctx);

        let response = app
            .oneshot(verify_request(&[
                ("transcripts", "Transcript_A1.pdf", b"%PDF"),
                ("forms", "Forms_A1_form.pdf", b"%PDF"),
            ]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert!(live_file.exists(), "409'd request swept a live batch's uploads");
    }

    #[tokio::test]
    async fn bad_upload_releases_the_batch_slot() {
        let dir = TempDir::new().unwrap();
        let ctx = mock_context(dir.path(), Verdict::Verified);
        let app = verification_router(ctx.clone());

        // Forms missing: rejected with 400 after the slot was claimed.
        let response = app
            .clone()
            .oneshot(verify_request(&[(
                "transcripts",
                "Transcript_A1.pdf",
                b"%PDF",
            )]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(ctx.core.active_batch().unwrap().is_none());

        // A well-formed retry is not blocked by the failed attempt.
        let response = app
            .oneshot(verify_request(&[
                ("transcripts", "Transcript_A1.pdf", b"%PDF"),
                ("forms", "Forms_A1_form.pdf", b"%PDF"),
            ]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
