//! Veriform — candidate document verification service.
//!
//! Wires the production adapters (PDFium rendering, Ollama vision OCR,
//! Ollama marks verification) into the batch pipeline and serves the
//! HTTP API until Ctrl-C.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use veriform::api::{start_server, ApiContext};
use veriform::config::{self, AppConfig};
use veriform::core_state::CoreState;
use veriform::extraction::{OllamaVisionOcr, PdfiumRenderer};
use veriform::llm::ollama::OllamaClient;
use veriform::pipeline::CandidateAdapters;
use veriform::verification::OllamaVerifier;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    let app_config = AppConfig::from_env();
    info!(version = config::APP_VERSION, "Starting {}", config::APP_NAME);

    let core = Arc::new(CoreState::new());
    for dir in [&core.uploads_dir, &core.artifacts_dir, &core.pages_dir] {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("Cannot create working directory {}: {e}", dir.display());
            std::process::exit(1);
        }
    }

    let renderer = match PdfiumRenderer::new() {
        Ok(renderer) => renderer,
        Err(e) => {
            eprintln!("PDFium is required for PDF rendering: {e}");
            std::process::exit(1);
        }
    };

    let ollama = Arc::new(OllamaClient::new(
        &app_config.ollama_base_url,
        app_config.llm_timeout_secs,
    ));
    let adapters = CandidateAdapters {
        extractor: Arc::new(
            OllamaVisionOcr::new(ollama.clone(), app_config.ocr_model.clone(), renderer)
                .with_pages_dir(core.pages_dir.clone()),
        ),
        verifier: Arc::new(OllamaVerifier::new(
            ollama,
            app_config.verify_model.clone(),
        )),
    };

    let bind_addr = app_config.bind_addr;
    let ctx = ApiContext::new(core, app_config, adapters);
    let mut server = match start_server(ctx, bind_addr).await {
        Ok(server) => server,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    info!(addr = %server.addr, "Veriform ready");

    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("Failed to listen for shutdown signal: {e}");
    }
    info!("Shutting down");
    server.shutdown();
}
