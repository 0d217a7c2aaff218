//! Result projection
//!
//! Pure mapping from a terminal job snapshot to display fields. Field
//! presence checks only; no business logic.

use anthem_common::model::JobSnapshot;
use serde::{Deserialize, Serialize};

/// Remix lineage display data
///
/// Present only when the snapshot carries both the source job id and the
/// original title; a payload with either missing shows no lineage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemixLineage {
    pub source_job_id: String,
    pub original_title: String,
}

impl RemixLineage {
    /// Display label, e.g. `Remix of "First Light"`
    pub fn label(&self) -> String {
        format!("Remix of \"{}\"", self.original_title)
    }
}

/// Display fields for a finished session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultView {
    /// Whether generation succeeded
    pub succeeded: bool,
    /// Result heading
    pub heading: String,
    /// Playable audio source
    pub audio_url: Option<String>,
    /// Playable video source
    pub video_url: Option<String>,
    /// Download target: the video when present, else the audio
    pub download_url: Option<String>,
    /// Remix lineage, when fully specified
    pub remix_lineage: Option<RemixLineage>,
    /// Audio duration in seconds, when reported
    pub duration_seconds: Option<u64>,
}

impl ResultView {
    /// Project a terminal success snapshot into display fields
    pub fn success(snapshot: &JobSnapshot) -> Self {
        let download_url = snapshot
            .video_url
            .clone()
            .or_else(|| snapshot.audio_url.clone());

        Self {
            succeeded: true,
            heading: "Your anthem is ready!".to_string(),
            audio_url: snapshot.audio_url.clone(),
            video_url: snapshot.video_url.clone(),
            download_url,
            remix_lineage: lineage(snapshot),
            duration_seconds: snapshot.duration,
        }
    }

    /// Failure view: heading only, no playable sources
    pub fn failure(snapshot: Option<&JobSnapshot>) -> Self {
        Self {
            succeeded: false,
            heading: "Generation Failed".to_string(),
            audio_url: None,
            video_url: None,
            download_url: None,
            remix_lineage: snapshot.and_then(lineage),
            duration_seconds: None,
        }
    }
}

fn lineage(snapshot: &JobSnapshot) -> Option<RemixLineage> {
    match (&snapshot.remix_of, &snapshot.original_title) {
        (Some(source_job_id), Some(original_title)) => Some(RemixLineage {
            source_job_id: source_job_id.clone(),
            original_title: original_title.clone(),
        }),
        _ => None,
    }
}
