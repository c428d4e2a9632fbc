//! Ollama-backed marks verifier.
//!
//! Sends the candidate's transcript and form text to a fine-tuned
//! verification model and parses the binary verdict out of the reply.
//! "Not Verified" is checked first: the phrase contains "Verified", so
//! the order of the two checks is load-bearing.

use std::sync::Arc;

use tracing::{info, warn};

use super::{MarksVerifier, VerificationError};
use crate::llm::LlmClient;
use crate::pipeline::types::Verdict;

const NOT_VERIFIED: &str = "not verified";
const VERIFIED: &str = "verified";

pub struct OllamaVerifier {
    client: Arc<dyn LlmClient>,
    model: String,
}

impl OllamaVerifier {
    pub fn new(client: Arc<dyn LlmClient>, model: String) -> Self {
        Self { client, model }
    }

    fn build_prompt(transcript_text: &str, form_text: &str) -> String {
        format!(
            "Here is the marksheet and admission form data for comparison:\n\n\
             Marksheet:\n{transcript_text}\n\n\
             Admission Form:\n{form_text}\n\n\
             Please compare the subject-wise marks for each class between the marksheet data \
             and the form data and return a binary outcome as 'Verified' or 'Not Verified'.\n\
             Class 10 and Class 12 details are important, so if the data is not available for \
             them then return 'Not Verified' directly. There are some conditions for Class 12 \
             scores stated below.\n\
             For Class 12:\n\
             If both actual and predicted marks are provided in the form, compare only the \
             actual marks with the marksheet.\n\
             If only predicted marks are available, skip Class 12 and check other classes' scores.\n\
             Based on the subject-wise comparison for all classes:\n\
             If the marks for any subject in any class do not match, return 'Not Verified'.\n\
             If the marks in both the admission form and marksheet match for every subject in \
             all classes, return 'Verified'.\n\
             Do not perform calculations, percentages, or provide any explanations. Return only \
             'Verified' or 'Not Verified' as your final output."
        )
    }
}

impl MarksVerifier for OllamaVerifier {
    fn verify(&self, transcript_text: &str, form_text: &str) -> Result<Verdict, VerificationError> {
        let _span = tracing::info_span!("verify_marks", model = %self.model).entered();
        let start = std::time::Instant::now();

        let prompt = Self::build_prompt(transcript_text, form_text);
        let response = self.client.generate(&self.model, &prompt, "")?;
        let verdict = parse_verdict(&response)?;

        info!(
            model = %self.model,
            elapsed_ms = %start.elapsed().as_millis(),
            verdict = %verdict,
            "Marks verification complete"
        );
        Ok(verdict)
    }
}

/// Case-insensitive verdict parse. "not verified" wins over "verified"
/// because the former contains the latter.
fn parse_verdict(response: &str) -> Result<Verdict, VerificationError> {
    let lower = response.to_lowercase();
    if lower.contains(NOT_VERIFIED) {
        Ok(Verdict::NotVerified)
    } else if lower.contains(VERIFIED) {
        Ok(Verdict::Verified)
    } else {
        warn!(response_len = response.len(), "Verifier output had no recognizable verdict");
        Err(VerificationError::UnrecognizedOutput(
            response.chars().take(200).collect(),
        ))
    }
}

// ── Mock for testing ──────────────────────────────────────

/// Mock verifier returning a fixed verdict, or an injected failure.
pub struct MockVerifier {
    outcome: Result<Verdict, String>,
}

impl MockVerifier {
    pub fn new(verdict: Verdict) -> Self {
        Self {
            outcome: Ok(verdict),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
        }
    }
}

impl MarksVerifier for MockVerifier {
    fn verify(
        &self,
        _transcript_text: &str,
        _form_text: &str,
    ) -> Result<Verdict, VerificationError> {
        match &self.outcome {
            Ok(verdict) => Ok(*verdict),
            Err(message) => Err(VerificationError::UnrecognizedOutput(message.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ollama::MockLlmClient;

    #[test]
    fn parse_verified() {
        assert_eq!(parse_verdict("Verified").unwrap(), Verdict::Verified);
        assert_eq!(parse_verdict("  verified  ").unwrap(), Verdict::Verified);
    }

    #[test]
    fn parse_not_verified_wins_over_verified() {
        assert_eq!(parse_verdict("Not Verified").unwrap(), Verdict::NotVerified);
        assert_eq!(
            parse_verdict("The marks do not match: Not Verified").unwrap(),
            Verdict::NotVerified
        );
    }

    #[test]
    fn parse_chatty_but_verified() {
        assert_eq!(
            parse_verdict("All subjects match. Verified.").unwrap(),
            Verdict::Verified
        );
    }

    #[test]
    fn parse_unrecognized_output() {
        let err = parse_verdict("I cannot compare these documents").unwrap_err();
        assert!(matches!(err, VerificationError::UnrecognizedOutput(_)));
    }

    #[test]
    fn prompt_includes_both_documents() {
        let prompt = OllamaVerifier::build_prompt("transcript body", "form body");
        assert!(prompt.contains("Marksheet:\ntranscript body"));
        assert!(prompt.contains("Admission Form:\nform body"));
        assert!(prompt.contains("'Verified' or 'Not Verified'"));
    }

    #[test]
    fn verify_via_mock_client() {
        let client = Arc::new(MockLlmClient::new("Not Verified"));
        let verifier = OllamaVerifier::new(client, "marks-verification-model".into());
        let verdict = verifier.verify("t", "f").unwrap();
        assert_eq!(verdict, Verdict::NotVerified);
    }

    #[test]
    fn verify_propagates_client_error() {
        let client = Arc::new(MockLlmClient::failing("connection refused"));
        let verifier = OllamaVerifier::new(client, "marks-verification-model".into());
        let err = verifier.verify("t", "f").unwrap_err();
        assert!(matches!(err, VerificationError::Llm(_)));
    }

    #[test]
    fn mock_verifier_fixed_verdict() {
        let verifier = MockVerifier::new(Verdict::Verified);
        assert_eq!(verifier.verify("a", "b").unwrap(), Verdict::Verified);

        let failing = MockVerifier::failing("boom");
        assert!(failing.verify("a", "b").is_err());
    }
}
