//! Status step tables driving the poll-session state machine
//!
//! The status→outcome mapping is data, not control flow: the poll engine
//! walks whatever table it is given, so pipeline shape (audio-only vs
//! audio+video) is selected by configuration, never by code changes.

use crate::model::JobStatus;
use serde::{Deserialize, Serialize};

/// What reaching a status step means for the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// Non-terminal: keep polling
    Continue,
    /// Terminal: generation finished, render the result
    Success,
    /// Terminal: generation failed, render the failure
    Failure,
}

/// One entry of the status table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusStep {
    /// Backend status this step matches
    pub status: JobStatus,
    /// Progress indicator value (0-100)
    pub progress: u8,
    /// Progress message shown to the user
    pub message: String,
    /// Session outcome when this step is reached
    pub outcome: StepOutcome,
}

/// Pipeline shape exposed by the generation backend
///
/// The two deployed pipelines disagree on whether AUDIO_READY is terminal;
/// the profile makes that a configuration choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineProfile {
    /// Audio then video; VIDEO_READY is the terminal success
    #[default]
    AudioVideo,
    /// Audio only; AUDIO_READY is the terminal success
    AudioOnly,
}

impl PipelineProfile {
    /// Build the status table for this pipeline shape
    pub fn table(&self) -> StatusTable {
        match self {
            PipelineProfile::AudioVideo => StatusTable::audio_video(),
            PipelineProfile::AudioOnly => StatusTable::audio_only(),
        }
    }
}

impl std::str::FromStr for PipelineProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "audio_video" => Ok(PipelineProfile::AudioVideo),
            "audio_only" => Ok(PipelineProfile::AudioOnly),
            other => Err(format!("unknown pipeline profile '{other}'")),
        }
    }
}

/// Ordered status→step lookup table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusTable {
    steps: Vec<StatusStep>,
}

impl StatusTable {
    /// Table for the audio+video pipeline
    ///
    /// AUDIO_READY is an intermediate stage here: progress advances and the
    /// partial audio asset is surfaced while video generation continues.
    pub fn audio_video() -> Self {
        Self {
            steps: vec![
                StatusStep {
                    status: JobStatus::Pending,
                    progress: 10,
                    message: "Received request. Starting generation...".to_string(),
                    outcome: StepOutcome::Continue,
                },
                StatusStep {
                    status: JobStatus::AudioReady,
                    progress: 60,
                    message: "Audio generated! Preparing video...".to_string(),
                    outcome: StepOutcome::Continue,
                },
                StatusStep {
                    status: JobStatus::VideoReady,
                    progress: 100,
                    message: "Complete! Your anthem is ready!".to_string(),
                    outcome: StepOutcome::Success,
                },
                StatusStep {
                    status: JobStatus::Failed,
                    progress: 100,
                    message: "Generation failed. Please try again.".to_string(),
                    outcome: StepOutcome::Failure,
                },
            ],
        }
    }

    /// Table for the audio-only pipeline (AUDIO_READY is terminal)
    pub fn audio_only() -> Self {
        Self {
            steps: vec![
                StatusStep {
                    status: JobStatus::Pending,
                    progress: 10,
                    message: "Received request. Starting generation...".to_string(),
                    outcome: StepOutcome::Continue,
                },
                StatusStep {
                    status: JobStatus::AudioReady,
                    progress: 100,
                    message: "Complete! Your anthem is ready!".to_string(),
                    outcome: StepOutcome::Success,
                },
                StatusStep {
                    status: JobStatus::Failed,
                    progress: 100,
                    message: "Generation failed. Please try again.".to_string(),
                    outcome: StepOutcome::Failure,
                },
            ],
        }
    }

    /// Find the step for a status, None when the table has no entry
    pub fn find(&self, status: JobStatus) -> Option<&StatusStep> {
        self.steps.iter().find(|s| s.status == status)
    }

    /// Whether a status is terminal under this table
    pub fn is_terminal(&self, status: JobStatus) -> bool {
        self.find(status)
            .map(|s| s.outcome != StepOutcome::Continue)
            .unwrap_or(false)
    }

    /// All steps in table order
    pub fn steps(&self) -> &[StatusStep] {
        &self.steps
    }
}
