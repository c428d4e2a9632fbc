//! The verification batch pipeline.
//!
//! Flow: `matcher` pairs uploaded documents into work items, `scheduler`
//! fans them out to `candidate` pipelines under a concurrency bound, and
//! a single fan-in consumer folds their messages through `progress` into
//! the NDJSON event stream while collecting verdicts in `store`.

pub mod cancel;
pub mod candidate;
pub mod cleanup;
pub mod error;
pub mod matcher;
pub mod progress;
pub mod scheduler;
pub mod store;
pub mod types;

pub use cancel::CancelToken;
pub use candidate::CandidateAdapters;
pub use error::PipelineError;
pub use progress::{EventStatus, ProgressEvent};
pub use scheduler::{new_batch_id, run_batch, BatchRun};
pub use types::{BatchConfig, Verdict, VerificationOutcome, WorkItem};
