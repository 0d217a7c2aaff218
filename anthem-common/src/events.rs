//! Event types and EventBus for the Anthem client
//!
//! Poll sessions publish their lifecycle here; front-ends (CLI, tests)
//! subscribe and render. The engine itself never touches presentation.

use crate::model::JobSnapshot;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Anthem client events
///
/// Events are broadcast via [`EventBus`] and can be serialized for logging
/// or transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnthemEvent {
    /// A job submission was accepted by the backend
    SubmissionAccepted {
        /// Job identifier to poll
        job_id: String,
        /// Source job id when the submission was a remix
        remix_of: Option<String>,
        /// When the acknowledgement arrived
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A poll tick matched a status step; progress indicator should update
    ProgressUpdated {
        /// Poll session id
        session_id: Uuid,
        /// Job being polled
        job_id: String,
        /// Raw backend status for display
        status: String,
        /// Progress percentage (0-100)
        progress: u8,
        /// Progress message for display
        message: String,
        /// When the snapshot was processed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The intermediate audio asset became available while polling continues
    ///
    /// Emitted only by pipelines where AUDIO_READY is non-terminal.
    PartialAudioReady {
        /// Poll session id
        session_id: Uuid,
        /// Job being polled
        job_id: String,
        /// Playable audio URL
        audio_url: String,
        /// When the snapshot was processed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The session reached its terminal success status
    SessionSucceeded {
        /// Poll session id
        session_id: Uuid,
        /// Job that completed
        job_id: String,
        /// Final snapshot for result rendering
        snapshot: JobSnapshot,
        /// When the terminal snapshot was processed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The backend reported FAILED (a legitimate terminal outcome)
    SessionFailed {
        /// Poll session id
        session_id: Uuid,
        /// Job that failed
        job_id: String,
        /// Final snapshot, if one was decoded
        snapshot: Option<JobSnapshot>,
        /// When the failure was processed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A status request failed; the session stopped without a verdict
    SessionErrored {
        /// Poll session id
        session_id: Uuid,
        /// Job being polled when the error occurred
        job_id: String,
        /// Transport/decode error description
        detail: String,
        /// When the error occurred
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The session was cancelled before reaching a terminal state
    ///
    /// Normally caused by a new submission superseding the active session.
    SessionCancelled {
        /// Poll session id
        session_id: Uuid,
        /// Job whose polling stopped
        job_id: String,
        /// When cancellation was requested
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

/// Central event distribution bus
///
/// Backed by tokio::broadcast: non-blocking publish, multiple concurrent
/// subscribers, automatic cleanup when subscribers drop.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AnthemEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<AnthemEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)`, or `Err` when nobody is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: AnthemEvent,
    ) -> Result<usize, broadcast::error::SendError<AnthemEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscriber case
    ///
    /// For periodic progress events where a missing listener is normal.
    pub fn emit_lossy(&self, event: AnthemEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
