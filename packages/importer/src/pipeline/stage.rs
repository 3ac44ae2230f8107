//! Run stages, tracked so failures can say where they happened.

use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Scheduled,
    Authenticating,
    Crawling,
    Extracting,
    Deduplicating,
    Persisting,
    Succeeded,
    Failed,
}

impl RunStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStage::Scheduled => "scheduled",
            RunStage::Authenticating => "authenticating",
            RunStage::Crawling => "crawling",
            RunStage::Extracting => "extracting",
            RunStage::Deduplicating => "deduplicating",
            RunStage::Persisting => "persisting",
            RunStage::Succeeded => "succeeded",
            RunStage::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStage::Succeeded | RunStage::Failed)
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared cell holding the current stage.
///
/// Cloned into the run future so the recovery boundary can still read the
/// last stage after a panic or timeout dropped that future.
#[derive(Debug, Clone)]
pub struct StageTracker {
    current: Arc<Mutex<RunStage>>,
}

impl Default for StageTracker {
    fn default() -> Self {
        Self {
            current: Arc::new(Mutex::new(RunStage::Scheduled)),
        }
    }
}

impl StageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self, stage: RunStage) {
        let mut current = self.current.lock().unwrap_or_else(|p| p.into_inner());
        if current.is_terminal() {
            return;
        }
        debug!(from = %*current, to = %stage, "Run stage");
        *current = stage;
    }

    pub fn current(&self) -> RunStage {
        *self.current.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_stage_sticks() {
        let tracker = StageTracker::new();
        tracker.enter(RunStage::Crawling);
        assert_eq!(tracker.current(), RunStage::Crawling);

        tracker.enter(RunStage::Failed);
        tracker.enter(RunStage::Persisting);
        assert_eq!(tracker.current(), RunStage::Failed);
    }

    #[test]
    fn test_clones_share_state() {
        let tracker = StageTracker::new();
        let inner = tracker.clone();
        inner.enter(RunStage::Extracting);
        assert_eq!(tracker.current(), RunStage::Extracting);
    }
}
