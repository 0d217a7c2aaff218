//! Domain model for song-generation requests and job status
//!
//! # Job lifecycle
//! PENDING → AUDIO_READY → VIDEO_READY (audio+video pipeline)
//! PENDING → AUDIO_READY (audio-only pipeline)
//! Any non-terminal state may transition to FAILED.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Minimum lyrics length accepted for submission (characters, after trim)
pub const MIN_LYRICS_LEN: usize = 10;

/// Job status as reported by the generation backend
///
/// The backend is the only producer of these values; the client never
/// synthesizes them. Unknown wire values are preserved as raw strings on
/// [`JobSnapshot`] and simply find no matching status step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Request accepted, generation not finished
    Pending,
    /// Audio asset generated (terminal only in the audio-only pipeline)
    AudioReady,
    /// Video asset generated (terminal)
    VideoReady,
    /// Generation failed (terminal)
    Failed,
}

impl JobStatus {
    /// Parse a wire status string, returning None for unrecognized values
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(JobStatus::Pending),
            "AUDIO_READY" => Some(JobStatus::AudioReady),
            "VIDEO_READY" => Some(JobStatus::VideoReady),
            "FAILED" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// Wire representation of this status
    pub fn as_wire(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::AudioReady => "AUDIO_READY",
            JobStatus::VideoReady => "VIDEO_READY",
            JobStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Prompt validation errors
///
/// Raised locally before any network call; a prompt that fails validation
/// is never submitted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("Lyrics must be at least {MIN_LYRICS_LEN} characters long (got {0})")]
    LyricsTooShort(usize),

    #[error("Genre '{0}' is not supported")]
    UnknownGenre(String),

    #[error("Mood '{0}' is not supported")]
    UnknownMood(String),

    #[error("Language '{0}' is not supported")]
    UnknownLanguage(String),
}

/// Supported genres
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Genre {
    Afrobeats,
    Highlife,
    Gengetone,
    Amapiano,
    Pop,
    Hiphop,
}

impl Genre {
    pub const ALL: [Genre; 6] = [
        Genre::Afrobeats,
        Genre::Highlife,
        Genre::Gengetone,
        Genre::Amapiano,
        Genre::Pop,
        Genre::Hiphop,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Genre::Afrobeats => "afrobeats",
            Genre::Highlife => "highlife",
            Genre::Gengetone => "gengetone",
            Genre::Amapiano => "amapiano",
            Genre::Pop => "pop",
            Genre::Hiphop => "hiphop",
        }
    }
}

impl std::str::FromStr for Genre {
    type Err = PromptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Genre::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| PromptError::UnknownGenre(s.to_string()))
    }
}

impl std::fmt::Display for Genre {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported moods (cultural themes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Celebratory,
    Resilience,
    Love,
    Harvest,
    Protest,
    Reflection,
}

impl Mood {
    pub const ALL: [Mood; 6] = [
        Mood::Celebratory,
        Mood::Resilience,
        Mood::Love,
        Mood::Harvest,
        Mood::Protest,
        Mood::Reflection,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Celebratory => "celebratory",
            Mood::Resilience => "resilience",
            Mood::Love => "love",
            Mood::Harvest => "harvest",
            Mood::Protest => "protest",
            Mood::Reflection => "reflection",
        }
    }
}

impl std::str::FromStr for Mood {
    type Err = PromptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mood::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| PromptError::UnknownMood(s.to_string()))
    }
}

impl std::fmt::Display for Mood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported lyric languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    English,
    Luganda,
    Swahili,
    Yoruba,
    French,
    Arabic,
}

impl Language {
    pub const ALL: [Language; 6] = [
        Language::English,
        Language::Luganda,
        Language::Swahili,
        Language::Yoruba,
        Language::French,
        Language::Arabic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Luganda => "Luganda",
            Language::Swahili => "Swahili",
            Language::Yoruba => "Yoruba",
            Language::French => "French",
            Language::Arabic => "Arabic",
        }
    }
}

impl std::str::FromStr for Language {
    type Err = PromptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::ALL
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| PromptError::UnknownLanguage(s.to_string()))
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Song generation request payload
///
/// Serializes to the body of `POST /generate-song/`. Vocabulary fields are
/// valid by construction; only lyrics need pre-submission validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongPrompt {
    /// Optional song title
    pub title: Option<String>,
    /// Raw lyrics provided by the user
    pub lyrics: String,
    /// Requested genre
    pub genre: Genre,
    /// Requested mood
    pub mood: Mood,
    /// Lyric language
    pub language: Language,
    /// Requested voice type, if supported by the backend
    pub voice_type: Option<String>,
    /// Whether the generated song may be publicly listed and remixed
    pub is_public: bool,
    /// Source job id when this prompt remixes a prior song
    pub remix_of: Option<String>,
}

impl SongPrompt {
    /// Create a prompt with default vocabulary choices
    pub fn new(lyrics: impl Into<String>) -> Self {
        Self {
            title: None,
            lyrics: lyrics.into(),
            genre: Genre::Afrobeats,
            mood: Mood::Celebratory,
            language: Language::English,
            voice_type: None,
            is_public: false,
            remix_of: None,
        }
    }

    /// Validate the prompt before submission
    ///
    /// Checks the lyrics length floor; no network call is made for an
    /// invalid prompt.
    pub fn validate(&self) -> Result<(), PromptError> {
        let len = self.lyrics.trim().chars().count();
        if len < MIN_LYRICS_LEN {
            return Err(PromptError::LyricsTooShort(len));
        }
        Ok(())
    }
}

/// Response body of a successful job submission
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionReceipt {
    /// Opaque job identifier used for status polling
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    /// Initial status reported by the backend (normally PENDING)
    #[serde(default)]
    pub status: Option<String>,
    /// Human-readable acknowledgement
    #[serde(default)]
    pub message: Option<String>,
}

/// Response body of a successful remix submission
#[derive(Debug, Clone, Deserialize)]
pub struct RemixReceipt {
    /// Opaque job identifier of the new remix job
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    /// Job identifier of the song being remixed
    #[serde(default, deserialize_with = "opt_id_string")]
    pub remix_of: Option<String>,
    /// Title of the original song
    #[serde(default)]
    pub original_title: Option<String>,
    /// Human-readable acknowledgement
    #[serde(default)]
    pub message: Option<String>,
}

/// One status-poll response: an immutable snapshot of the job
///
/// Snapshots are not accumulated across ticks; each tick replaces the last.
/// The raw status string is preserved so unrecognized backend values pass
/// through without a deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// Raw wire status (see [`JobSnapshot::status`])
    #[serde(rename = "status", default)]
    pub raw_status: Option<String>,
    /// URL of the generated audio asset, once available
    #[serde(default)]
    pub audio_url: Option<String>,
    /// URL of the generated music video, once available
    #[serde(default)]
    pub video_url: Option<String>,
    /// Duration of the generated audio in seconds
    #[serde(default)]
    pub duration: Option<u64>,
    /// Source job id when this job is a remix
    #[serde(default, deserialize_with = "opt_id_string")]
    pub remix_of: Option<String>,
    /// Title of the remixed original, when this job is a remix
    #[serde(default)]
    pub original_title: Option<String>,
    /// How many times this song has been remixed
    #[serde(default)]
    pub remix_count: Option<u64>,
    /// Whether the song is publicly listed
    #[serde(default)]
    pub is_public: Option<bool>,
    /// Job creation time
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last status change time
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl JobSnapshot {
    /// Parsed status, None when the wire value is missing or unrecognized
    pub fn status(&self) -> Option<JobStatus> {
        self.raw_status.as_deref().and_then(JobStatus::from_wire)
    }
}

/// Accept a job identifier as either a JSON string or a JSON number
///
/// The backend issues integer primary keys today; the client treats ids as
/// opaque strings so an id-scheme change needs no client update.
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum WireId {
        Text(String),
        Number(i64),
    }

    Ok(match WireId::deserialize(deserializer)? {
        WireId::Text(s) => s,
        WireId::Number(n) => n.to_string(),
    })
}

fn opt_id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum WireId {
        Text(String),
        Number(i64),
    }

    Ok(Option::<WireId>::deserialize(deserializer)?.map(|id| match id {
        WireId::Text(s) => s,
        WireId::Number(n) => n.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_round_trip() {
        for status in [
            JobStatus::Pending,
            JobStatus::AudioReady,
            JobStatus::VideoReady,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::from_wire(status.as_wire()), Some(status));
        }
    }

    #[test]
    fn test_unknown_status_parses_to_none() {
        assert_eq!(JobStatus::from_wire("MASTERING"), None);
        assert_eq!(JobStatus::from_wire(""), None);
        assert_eq!(JobStatus::from_wire("pending"), None);
    }

    #[test]
    fn test_prompt_validation_rejects_short_lyrics() {
        let prompt = SongPrompt::new("la la");
        assert_eq!(prompt.validate(), Err(PromptError::LyricsTooShort(5)));
    }

    #[test]
    fn test_prompt_validation_trims_whitespace() {
        let prompt = SongPrompt::new("   la la   ");
        assert_eq!(prompt.validate(), Err(PromptError::LyricsTooShort(5)));
    }

    #[test]
    fn test_prompt_validation_accepts_long_lyrics() {
        let prompt = SongPrompt::new("We rise together under one sun");
        assert!(prompt.validate().is_ok());
    }

    #[test]
    fn test_vocabulary_parse() {
        assert_eq!("amapiano".parse::<Genre>(), Ok(Genre::Amapiano));
        assert_eq!("protest".parse::<Mood>(), Ok(Mood::Protest));
        assert_eq!("Swahili".parse::<Language>(), Ok(Language::Swahili));
        assert_eq!(
            "trance".parse::<Genre>(),
            Err(PromptError::UnknownGenre("trance".to_string()))
        );
    }

    #[test]
    fn test_prompt_serializes_wire_field_names() {
        let mut prompt = SongPrompt::new("We rise together under one sun");
        prompt.title = Some("Sunrise".to_string());
        prompt.genre = Genre::Highlife;

        let json = serde_json::to_value(&prompt).unwrap();
        assert_eq!(json["title"], "Sunrise");
        assert_eq!(json["genre"], "highlife");
        assert_eq!(json["mood"], "celebratory");
        assert_eq!(json["language"], "English");
        assert_eq!(json["is_public"], false);
        assert!(json["remix_of"].is_null());
    }

    #[test]
    fn test_receipt_accepts_numeric_id() {
        let receipt: SubmissionReceipt =
            serde_json::from_str(r#"{"id": 42, "status": "PENDING"}"#).unwrap();
        assert_eq!(receipt.id, "42");
    }

    #[test]
    fn test_snapshot_with_unknown_status() {
        let snapshot: JobSnapshot =
            serde_json::from_str(r#"{"status": "MASTERING", "audio_url": null}"#).unwrap();
        assert_eq!(snapshot.raw_status.as_deref(), Some("MASTERING"));
        assert_eq!(snapshot.status(), None);
    }

    #[test]
    fn test_snapshot_full_payload() {
        let snapshot: JobSnapshot = serde_json::from_str(
            r#"{
                "status": "VIDEO_READY",
                "audio_url": "https://cdn.example/a.mp3",
                "video_url": "https://cdn.example/v.mp4",
                "duration": 183,
                "remix_of": 7,
                "original_title": "First Light",
                "remix_count": 2,
                "is_public": true
            }"#,
        )
        .unwrap();
        assert_eq!(snapshot.status(), Some(JobStatus::VideoReady));
        assert_eq!(snapshot.remix_of.as_deref(), Some("7"));
        assert_eq!(snapshot.duration, Some(183));
    }
}
