//! PDF text extraction: page rendering plus vision OCR.
//!
//! The pipeline consumes extraction through the `TextExtractor` trait, so
//! candidate processing can be tested without PDFium or a running Ollama.

pub mod markdown;
pub mod ocr;
pub mod pdfium;

use std::path::Path;

use thiserror::Error;

pub use ocr::{MockTextExtractor, OllamaVisionOcr};
pub use pdfium::PdfiumRenderer;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("PDF rendering failed on page {page}: {reason}")]
    PdfRendering { page: usize, reason: String },

    /// Password-protected documents are rejected rather than retried.
    #[error("PDF is encrypted or password-protected")]
    PdfEncrypted,

    #[error("image processing failed: {0}")]
    ImageProcessing(String),

    #[error("vision OCR failed: {0}")]
    Ocr(#[from] crate::llm::OllamaError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Page-oriented text access over a candidate document.
///
/// Implementations are synchronous and blocking; the scheduler runs them
/// on the blocking thread pool.
pub trait TextExtractor: Send + Sync {
    /// Number of pages in the document.
    fn page_count(&self, path: &Path) -> Result<usize, ExtractionError>;

    /// Plain text of one page (zero-based index).
    fn extract_text(&self, path: &Path, page: usize) -> Result<String, ExtractionError>;

    /// First page (zero-based) whose text contains `marker`,
    /// case-insensitively. Scans pages in order; `None` when absent.
    fn locate_marker(&self, path: &Path, marker: &str) -> Result<Option<usize>, ExtractionError> {
        let total = self.page_count(path)?;
        let needle = marker.to_lowercase();
        for page in 0..total {
            let text = self.extract_text(path, page)?;
            if text.to_lowercase().contains(&needle) {
                return Ok(Some(page));
            }
        }
        Ok(None)
    }
}
