//! Batch result store and CSV export.

use tracing::warn;

use super::types::VerificationOutcome;

/// Append-only collection of finalized outcomes for one batch.
/// At most one outcome per candidate; duplicates are dropped with a warning.
#[derive(Debug, Default)]
pub struct ResultStore {
    outcomes: Vec<VerificationOutcome>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the outcome was a duplicate and dropped.
    pub fn push(&mut self, outcome: VerificationOutcome) -> bool {
        if self
            .outcomes
            .iter()
            .any(|existing| existing.candidate_id == outcome.candidate_id)
        {
            warn!(candidate_id = %outcome.candidate_id, "Duplicate outcome for candidate, dropped");
            return false;
        }
        self.outcomes.push(outcome);
        true
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn into_outcomes(self) -> Vec<VerificationOutcome> {
        self.outcomes
    }
}

/// Quote a CSV field when it contains a delimiter, quote, or newline.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Renders outcomes as CSV, one row per candidate, in store order.
pub fn to_csv(outcomes: &[VerificationOutcome]) -> String {
    let mut csv = String::from("Candidate,Result\n");
    for outcome in outcomes {
        csv.push_str(&csv_field(&outcome.candidate_id));
        csv.push(',');
        csv.push_str(outcome.verdict.as_str());
        csv.push('\n');
    }
    csv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::Verdict;

    fn outcome(id: &str, verdict: Verdict) -> VerificationOutcome {
        VerificationOutcome {
            candidate_id: id.to_string(),
            verdict,
        }
    }

    #[test]
    fn store_keeps_first_outcome_per_candidate() {
        let mut store = ResultStore::new();
        assert!(store.push(outcome("A1", Verdict::Verified)));
        assert!(!store.push(outcome("A1", Verdict::NotVerified)));
        assert!(store.push(outcome("B2", Verdict::NotVerified)));

        let outcomes = store.into_outcomes();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].verdict, Verdict::Verified);
    }

    #[test]
    fn csv_has_header_and_rows() {
        let outcomes = vec![
            outcome("A1", Verdict::Verified),
            outcome("B2", Verdict::NotVerified),
        ];
        assert_eq!(
            to_csv(&outcomes),
            "Candidate,Result\nA1,Verified\nB2,Not Verified\n"
        );
    }

    #[test]
    fn csv_empty_store_is_header_only() {
        assert_eq!(to_csv(&[]), "Candidate,Result\n");
    }

    #[test]
    fn csv_escapes_awkward_candidate_ids() {
        let outcomes = vec![outcome("A,1\"x", Verdict::Verified)];
        assert_eq!(
            to_csv(&outcomes),
            "Candidate,Result\n\"A,1\"\"x\",Verified\n"
        );
    }
}
