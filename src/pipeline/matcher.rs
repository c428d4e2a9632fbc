//! Candidate matching: pairing transcripts with admission forms.
//!
//! Candidate IDs are carved out of filenames by fixed prefix/suffix
//! patterns; only IDs present in both directories become work items.
//! Unmatched files are logged and skipped, never treated as errors.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::error::PipelineError;
use super::types::WorkItem;

/// Fixed filename pattern: everything between `prefix` and `suffix` is
/// the candidate ID.
#[derive(Debug, Clone)]
pub struct FilePattern {
    prefix: &'static str,
    suffix: &'static str,
}

impl FilePattern {
    /// `Transcript_<id>.pdf`
    pub fn transcript() -> Self {
        Self {
            prefix: "Transcript_",
            suffix: ".pdf",
        }
    }

    /// `Forms_<id>_form.pdf`
    pub fn form() -> Self {
        Self {
            prefix: "Forms_",
            suffix: "_form.pdf",
        }
    }

    /// Extracts the candidate ID, or `None` when the name does not match
    /// or the ID would be empty.
    pub fn candidate_id<'a>(&self, file_name: &'a str) -> Option<&'a str> {
        file_name
            .strip_prefix(self.prefix)
            .and_then(|rest| rest.strip_suffix(self.suffix))
            .filter(|id| !id.is_empty())
    }
}

/// Index one directory's matching files by candidate ID.
/// On duplicate IDs the last directory entry wins.
fn index_by_candidate(
    dir: &Path,
    pattern: &FilePattern,
) -> Result<HashMap<String, PathBuf>, PipelineError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| PipelineError::Setup(format!("cannot read {}: {e}", dir.display())))?;

    let mut index = HashMap::new();
    for entry in entries {
        let entry = entry
            .map_err(|e| PipelineError::Setup(format!("cannot read {}: {e}", dir.display())))?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            debug!(path = %entry.path().display(), "Skipping non-UTF8 filename");
            continue;
        };
        match pattern.candidate_id(name) {
            Some(id) => {
                index.insert(id.to_string(), entry.path());
            }
            None => {
                debug!(file = name, "Filename does not match pattern, skipped");
            }
        }
    }
    Ok(index)
}

/// Pairs transcripts and forms by candidate ID.
///
/// Output is sorted by candidate ID so batch ordering is deterministic.
pub fn match_candidates(
    transcripts_dir: &Path,
    forms_dir: &Path,
) -> Result<Vec<WorkItem>, PipelineError> {
    let transcripts = index_by_candidate(transcripts_dir, &FilePattern::transcript())?;
    let mut forms = index_by_candidate(forms_dir, &FilePattern::form())?;

    let mut items: Vec<WorkItem> = transcripts
        .into_iter()
        .filter_map(|(candidate_id, transcript_path)| {
            match forms.remove(&candidate_id) {
                Some(form_path) => Some(WorkItem {
                    candidate_id,
                    transcript_path,
                    form_path,
                }),
                None => {
                    debug!(candidate_id = %candidate_id, "Transcript without matching form, skipped");
                    None
                }
            }
        })
        .collect();

    for candidate_id in forms.keys() {
        debug!(candidate_id = %candidate_id, "Form without matching transcript, skipped");
    }

    items.sort_by(|a, b| a.candidate_id.cmp(&b.candidate_id));
    info!(matched = items.len(), "Candidate matching complete");
    Ok(items)
}
