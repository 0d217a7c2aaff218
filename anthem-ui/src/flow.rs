//! UI stage flow
//!
//! Three stages: Input → Processing → Result. Submission moves to
//! Processing optimistically, before the network result is known; a
//! rejected submission returns to Input after a configurable delay, and a
//! terminal poll outcome moves to Result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which stage of the flow the user is looking at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiStage {
    /// Lyrics/metadata entry form
    Input,
    /// Submission in flight or job polling underway
    Processing,
    /// Terminal result (success or failure) on display
    Result,
}

/// Stage transition record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageTransition {
    pub old_stage: UiStage,
    pub new_stage: UiStage,
    pub transitioned_at: DateTime<Utc>,
}

/// Explicit stage state, owned by the front-end
///
/// Replaces the ambient show/hide globals of a browser UI with a value the
/// caller owns and tests can drive directly.
#[derive(Debug, Clone)]
pub struct StageFlow {
    stage: UiStage,
}

impl StageFlow {
    /// Start at the input stage
    pub fn new() -> Self {
        Self {
            stage: UiStage::Input,
        }
    }

    /// Current stage
    pub fn stage(&self) -> UiStage {
        self.stage
    }

    /// Optimistic move to Processing on submit, before the response lands
    pub fn begin_submission(&mut self) -> StageTransition {
        self.transition_to(UiStage::Processing)
    }

    /// Return to Input after a rejected submission
    ///
    /// The caller applies the configured delay before invoking this.
    pub fn reset_to_input(&mut self) -> StageTransition {
        self.transition_to(UiStage::Input)
    }

    /// Move to Result on a terminal poll outcome
    pub fn show_result(&mut self) -> StageTransition {
        self.transition_to(UiStage::Result)
    }

    fn transition_to(&mut self, new_stage: UiStage) -> StageTransition {
        let transition = StageTransition {
            old_stage: self.stage,
            new_stage,
            transitioned_at: Utc::now(),
        };
        tracing::debug!(
            old_stage = ?transition.old_stage,
            new_stage = ?transition.new_stage,
            "UI stage transition"
        );
        self.stage = new_stage;
        transition
    }
}

impl Default for StageFlow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_is_optimistic() {
        let mut flow = StageFlow::new();
        assert_eq!(flow.stage(), UiStage::Input);

        // Processing before any network result exists
        let t = flow.begin_submission();
        assert_eq!(t.old_stage, UiStage::Input);
        assert_eq!(flow.stage(), UiStage::Processing);
    }

    #[test]
    fn test_rejected_submission_resets_to_input() {
        let mut flow = StageFlow::new();
        flow.begin_submission();
        flow.reset_to_input();
        assert_eq!(flow.stage(), UiStage::Input);
    }

    #[test]
    fn test_terminal_outcome_shows_result() {
        let mut flow = StageFlow::new();
        flow.begin_submission();
        flow.show_result();
        assert_eq!(flow.stage(), UiStage::Result);
    }
}
