//! Markdown → plain text flattening.
//!
//! Vision models return page content as structured Markdown. The verifier
//! prompt wants flat prose, so the structure is stripped before the page
//! text enters the combined artifact.

use std::sync::OnceLock;

use regex::Regex;

fn regexes() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            // Images before links: ![alt](url) would otherwise half-match.
            (Regex::new(r"!\[[^\]]*\]\([^)]*\)").unwrap(), ""),
            (Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap(), "$1"),
            (Regex::new(r"(?m)^#{1,6}\s+").unwrap(), ""),
            (Regex::new(r"\*\*([^*]*)\*\*").unwrap(), "$1"),
            (Regex::new(r"\*([^*]*)\*").unwrap(), "$1"),
            (Regex::new(r"`([^`]*)`").unwrap(), "$1"),
            (Regex::new(r"(?m)^\s*[-*+]\s+").unwrap(), ""),
            // Table scaffolding: separator rows, then cell delimiters.
            (Regex::new(r"(?m)^\s*\|?[-:| ]+\|?\s*$").unwrap(), ""),
            (Regex::new(r"\|").unwrap(), " "),
        ]
    })
}

/// Strips Markdown syntax, collapses all whitespace runs to single spaces.
pub fn markdown_to_plaintext(markdown: &str) -> String {
    let mut text = markdown.to_string();
    for (pattern, replacement) in regexes() {
        text = pattern.replace_all(&text, *replacement).into_owned();
    }

    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    let ws = WHITESPACE.get_or_init(|| Regex::new(r"\s+").unwrap());
    ws.replace_all(&text, " ").trim().to_string()
}
