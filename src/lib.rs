pub mod api; // HTTP surface: /verify, /cancel, /export-csv, /health
pub mod config;
pub mod core_state; // Transport-agnostic shared state
pub mod extraction; // PDF rendering + vision OCR adapters
pub mod llm; // Ollama client (generate + chat-with-images)
pub mod pipeline; // Matching, scheduling, progress, cancellation, results
pub mod verification; // Marks verification adapter
