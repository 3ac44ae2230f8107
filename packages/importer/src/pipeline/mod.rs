//! Import pipeline: dedup, persistence, failure reporting and the runner
//! that ties them together.

pub mod dedup;
pub mod panic_trace;
pub mod persist;
pub mod report;
pub mod runner;
pub mod stage;

pub use dedup::{resolve, DedupStats, DuplicateIndex};
pub use report::{FailureReporter, FAILURE_SUBJECT};
pub use runner::{ImportRunner, RunOutcome, RunSummary};
pub use stage::{RunStage, StageTracker};
