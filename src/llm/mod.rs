//! Local LLM access via Ollama.
//!
//! Two narrow client traits keep the pipeline decoupled from HTTP details:
//! `LlmClient` for plain text generation (verification) and `VisionClient`
//! for image-grounded chat (page OCR). Both are implemented by `OllamaClient`
//! and by mocks for tests.

pub mod ollama;

pub use ollama::{MockLlmClient, OllamaClient};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OllamaError {
    #[error("Cannot reach Ollama at {0}")]
    Connection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Ollama returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse Ollama response: {0}")]
    ResponseParsing(String),
}

/// Plain text generation against a local model.
pub trait LlmClient: Send + Sync {
    fn generate(&self, model: &str, prompt: &str, system: &str) -> Result<String, OllamaError>;
}

/// Image-grounded chat against a local vision model.
/// Images are base64-encoded PNG/JPEG payloads.
pub trait VisionClient: Send + Sync {
    fn chat_with_images(
        &self,
        model: &str,
        user_prompt: &str,
        images: &[String],
        system: Option<&str>,
    ) -> Result<String, OllamaError>;
}
