use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Veriform";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the application data directory
/// ~/Veriform/ on all platforms (user-visible working directory)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("Veriform")
}

/// Batch upload staging: transcripts and forms land here per batch.
pub fn uploads_dir() -> PathBuf {
    app_data_dir().join("uploads")
}

/// Per-candidate combined-text artifacts (`<candidate>.txt`).
pub fn artifacts_dir() -> PathBuf {
    app_data_dir().join("results").join("ocr_results")
}

/// Transient rasterized page images, removed after each batch.
pub fn pages_dir() -> PathBuf {
    app_data_dir().join("pages")
}

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> &'static str {
    "info,veriform=debug"
}

/// Runtime configuration. Defaults match the original deployment; every
/// field can be overridden through a `VERIFORM_*` environment variable.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// Maximum candidate pipelines running concurrently.
    pub max_concurrent_candidates: usize,
    /// Base URL of the local Ollama instance.
    pub ollama_base_url: String,
    /// Vision model used for page OCR.
    pub ocr_model: String,
    /// Text model used for marks verification.
    pub verify_model: String,
    /// Phrase that marks the relevant section of the admission form.
    pub marker_phrase: String,
    /// Pages extracted after the marker page (marker page itself is always included).
    pub form_window_pages: usize,
    /// Retries per adapter call before the candidate is failed.
    pub adapter_max_retries: u32,
    /// Base backoff between retries, doubled per attempt.
    pub adapter_retry_backoff_ms: u64,
    /// HTTP timeout for Ollama calls.
    pub llm_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], 5500).into(),
            max_concurrent_candidates: 4,
            ollama_base_url: "http://localhost:11434".to_string(),
            ocr_model: "qwen2.5vl:7b".to_string(),
            verify_model: "marks-verification-model".to_string(),
            marker_phrase: "Class 9th".to_string(),
            form_window_pages: 2,
            adapter_max_retries: 2,
            adapter_retry_backoff_ms: 500,
            llm_timeout_secs: 300,
        }
    }
}

impl AppConfig {
    /// Build a config from defaults plus `VERIFORM_*` environment overrides.
    /// Unparsable values fall back to the default with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(addr) = env_parsed::<SocketAddr>("VERIFORM_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(workers) = env_parsed::<usize>("VERIFORM_WORKERS") {
            config.max_concurrent_candidates = workers.max(1);
        }
        if let Ok(url) = std::env::var("VERIFORM_OLLAMA_URL") {
            config.ollama_base_url = url;
        }
        if let Ok(model) = std::env::var("VERIFORM_OCR_MODEL") {
            config.ocr_model = model;
        }
        if let Ok(model) = std::env::var("VERIFORM_VERIFY_MODEL") {
            config.verify_model = model;
        }
        if let Ok(phrase) = std::env::var("VERIFORM_MARKER_PHRASE") {
            config.marker_phrase = phrase;
        }
        if let Some(pages) = env_parsed::<usize>("VERIFORM_FORM_WINDOW_PAGES") {
            config.form_window_pages = pages;
        }
        if let Some(retries) = env_parsed::<u32>("VERIFORM_ADAPTER_RETRIES") {
            config.adapter_max_retries = retries;
        }
        if let Some(backoff) = env_parsed::<u64>("VERIFORM_RETRY_BACKOFF_MS") {
            config.adapter_retry_backoff_ms = backoff;
        }
        if let Some(secs) = env_parsed::<u64>("VERIFORM_LLM_TIMEOUT_SECS") {
            config.llm_timeout_secs = secs;
        }

        config
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, raw, "Ignoring unparsable environment override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_under_home() {
        let dir = app_data_dir();
        let home = dirs::home_dir().unwrap();
        assert!(dir.starts_with(home));
        assert!(dir.ends_with("Veriform"));
    }

    #[test]
    fn artifacts_dir_under_results() {
        let dir = artifacts_dir();
        assert!(dir.starts_with(app_data_dir()));
        assert!(dir.ends_with("results/ocr_results"));
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }

    #[test]
    fn default_worker_pool_is_four() {
        assert_eq!(AppConfig::default().max_concurrent_candidates, 4);
    }

    #[test]
    fn default_marker_phrase() {
        assert_eq!(AppConfig::default().marker_phrase, "Class 9th");
    }

    #[test]
    fn default_bind_port_is_5500() {
        assert_eq!(AppConfig::default().bind_addr.port(), 5500);
    }

    #[test]
    fn env_overrides_window_and_backoff() {
        std::env::set_var("VERIFORM_FORM_WINDOW_PAGES", "5");
        std::env::set_var("VERIFORM_RETRY_BACKOFF_MS", "25");
        let config = AppConfig::from_env();
        std::env::remove_var("VERIFORM_FORM_WINDOW_PAGES");
        std::env::remove_var("VERIFORM_RETRY_BACKOFF_MS");
        assert_eq!(config.form_window_pages, 5);
        assert_eq!(config.adapter_retry_backoff_ms, 25);
    }
}
