//! Vision OCR extractor — page text via Ollama vision models.
//!
//! Bridges `PdfiumRenderer` (page → PNG) and the `VisionClient`
//! (PNG → Markdown) into the `TextExtractor` trait the pipeline consumes.
//! Rendered pages are optionally parked on disk while the model call is
//! in flight, which makes stuck extractions inspectable.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine as _;
use tracing::{debug, info, warn};

use super::markdown::markdown_to_plaintext;
use super::pdfium::{PdfiumRenderer, DEFAULT_RENDER_DPI};
use super::{ExtractionError, TextExtractor};
use crate::llm::VisionClient;

const OCR_SYSTEM_PROMPT: &str = "\
You are a document text extractor for academic records. Extract ALL visible \
text from the provided page image, preserving structure as Markdown. \
Output headers, tables, lists, and paragraphs. Be thorough and accurate.";

const OCR_USER_PROMPT: &str = "\
Extract all visible text from this document page as structured Markdown. \
Preserve tables using Markdown table syntax. Preserve headers using # syntax. \
Do not add commentary or explanations.";

/// Vision-model OCR over PDF pages.
pub struct OllamaVisionOcr {
    vision_client: Arc<dyn VisionClient>,
    model_name: String,
    renderer: PdfiumRenderer,
    /// When set, rendered PNGs are written here while the model call runs.
    pages_dir: Option<PathBuf>,
}

impl OllamaVisionOcr {
    pub fn new(
        vision_client: Arc<dyn VisionClient>,
        model_name: String,
        renderer: PdfiumRenderer,
    ) -> Self {
        Self {
            vision_client,
            model_name,
            renderer,
            pages_dir: None,
        }
    }

    pub fn with_pages_dir(mut self, pages_dir: PathBuf) -> Self {
        self.pages_dir = Some(pages_dir);
        self
    }

    fn park_page(&self, pdf_path: &Path, page: usize, png_bytes: &[u8]) {
        let Some(dir) = &self.pages_dir else { return };
        let stem = pdf_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "page".to_string());
        let target = dir.join(format!("{stem}_p{page}.png"));
        // Best-effort: a failed park never fails the extraction.
        if let Err(e) = std::fs::create_dir_all(dir).and_then(|_| std::fs::write(&target, png_bytes))
        {
            warn!(path = %target.display(), error = %e, "Failed to park rendered page");
        }
    }
}

impl TextExtractor for OllamaVisionOcr {
    fn page_count(&self, path: &Path) -> Result<usize, ExtractionError> {
        let pdf_bytes = std::fs::read(path)?;
        self.renderer.page_count(&pdf_bytes)
    }

    fn extract_text(&self, path: &Path, page: usize) -> Result<String, ExtractionError> {
        let _span = tracing::info_span!(
            "vision_ocr_page",
            model = %self.model_name,
            path = %path.display(),
            page,
        )
        .entered();
        let start = std::time::Instant::now();

        let pdf_bytes = std::fs::read(path)?;
        let png_bytes = self.renderer.render_page(&pdf_bytes, page, DEFAULT_RENDER_DPI)?;
        self.park_page(path, page, &png_bytes);

        let base64_image = base64::engine::general_purpose::STANDARD.encode(&png_bytes);
        let images = vec![base64_image];

        let markdown = self.vision_client.chat_with_images(
            &self.model_name,
            OCR_USER_PROMPT,
            &images,
            Some(OCR_SYSTEM_PROMPT),
        )?;

        let text = markdown_to_plaintext(&markdown);
        if text.is_empty() {
            debug!(page, "Vision model returned no text for page");
        }

        info!(
            model = %self.model_name,
            page,
            elapsed_ms = %start.elapsed().as_millis(),
            text_len = text.len(),
            "Page OCR complete"
        );

        Ok(text)
    }
}

// ── Mock for testing ──────────────────────────────────────

/// Mock text extractor with configurable page counts, marker placement,
/// and failure injection.
///
/// Page text is deterministic (`"<stem> page <n>"` plus the configured
/// marker on its page), so tests can assert on combined artifacts.
pub struct MockTextExtractor {
    pages: usize,
    /// Marker phrase injected on a specific page, for `locate_marker` tests.
    marker: Option<(String, usize)>,
    /// Any document whose path contains this substring fails extraction.
    fail_on: Option<String>,
    /// Per-page delay, for concurrency and cancellation tests.
    page_delay: Option<std::time::Duration>,
}

impl MockTextExtractor {
    pub fn new(pages: usize) -> Self {
        Self {
            pages,
            marker: None,
            fail_on: None,
            page_delay: None,
        }
    }

    pub fn with_marker(mut self, marker: &str, page: usize) -> Self {
        self.marker = Some((marker.to_string(), page));
        self
    }

    pub fn failing_on(mut self, path_substring: &str) -> Self {
        self.fail_on = Some(path_substring.to_string());
        self
    }

    pub fn with_page_delay(mut self, delay: std::time::Duration) -> Self {
        self.page_delay = Some(delay);
        self
    }

    fn check_failure(&self, path: &Path, page: usize) -> Result<(), ExtractionError> {
        if let Some(needle) = &self.fail_on {
            if path.to_string_lossy().contains(needle.as_str()) {
                return Err(ExtractionError::PdfRendering {
                    page,
                    reason: format!("injected failure for {}", path.display()),
                });
            }
        }
        Ok(())
    }
}

impl TextExtractor for MockTextExtractor {
    fn page_count(&self, path: &Path) -> Result<usize, ExtractionError> {
        self.check_failure(path, 0)?;
        Ok(self.pages)
    }

    fn extract_text(&self, path: &Path, page: usize) -> Result<String, ExtractionError> {
        self.check_failure(path, page)?;
        if page >= self.pages {
            return Err(ExtractionError::PdfRendering {
                page,
                reason: format!("page {page} out of range (mock has {} pages)", self.pages),
            });
        }
        if let Some(delay) = self.page_delay {
            std::thread::sleep(delay);
        }

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut text = format!("{stem} page {page}");
        if let Some((marker, marker_page)) = &self.marker {
            if *marker_page == page {
                text.push(' ');
                text.push_str(marker);
            }
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_page_text_is_deterministic() {
        let mock = MockTextExtractor::new(3);
        let text = mock.extract_text(Path::new("/x/Transcript_A1.pdf"), 1).unwrap();
        assert_eq!(text, "Transcript_A1 page 1");
    }

    #[test]
    fn mock_injects_marker_on_configured_page() {
        let mock = MockTextExtractor::new(4).with_marker("Class 9th", 2);
        let page2 = mock.extract_text(Path::new("/x/Forms_A1_form.pdf"), 2).unwrap();
        assert!(page2.contains("Class 9th"));
        let page0 = mock.extract_text(Path::new("/x/Forms_A1_form.pdf"), 0).unwrap();
        assert!(!page0.contains("Class 9th"));
    }

    #[test]
    fn default_locate_marker_scans_in_order() {
        let mock = MockTextExtractor::new(5).with_marker("Class 9th", 3);
        let found = mock
            .locate_marker(Path::new("/x/Forms_A1_form.pdf"), "class 9TH")
            .unwrap();
        assert_eq!(found, Some(3));
    }

    #[test]
    fn locate_marker_returns_none_when_absent() {
        let mock = MockTextExtractor::new(3);
        let found = mock
            .locate_marker(Path::new("/x/Forms_A1_form.pdf"), "Class 9th")
            .unwrap();
        assert_eq!(found, None);
    }

    #[test]
    fn mock_failure_injection_by_path() {
        let mock = MockTextExtractor::new(3).failing_on("Transcript_BAD");
        assert!(mock.page_count(Path::new("/x/Transcript_BAD.pdf")).is_err());
        assert!(mock.page_count(Path::new("/x/Transcript_OK.pdf")).is_ok());
    }

    #[test]
    fn mock_out_of_range_page_errors() {
        let mock = MockTextExtractor::new(2);
        let err = mock.extract_text(Path::new("/x/a.pdf"), 2).unwrap_err();
        assert!(matches!(err, ExtractionError::PdfRendering { page: 2, .. }));
    }
}
