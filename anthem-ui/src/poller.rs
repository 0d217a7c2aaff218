//! Job-status polling engine and session management
//!
//! # State Progression
//! SUBMITTED → POLLING → {SUCCEEDED, FAILED, ERRORED}
//!
//! POLLING is re-entrant: every tick that matches a non-terminal status
//! step loops back into POLLING. The status→outcome mapping comes from the
//! injected [`StatusTable`], so pipeline shape is configuration, not code.
//!
//! Termination is idempotent: the finished flag is claimed exactly once
//! (atomic swap), so a tick racing a cancellation can neither double-render
//! a result nor resurrect a stopped session. Cancelling the session token
//! is itself idempotent.

use anthem_common::events::{AnthemEvent, EventBus};
use anthem_common::model::JobSnapshot;
use anthem_common::steps::{StatusTable, StepOutcome};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::client::{ClientError, GenerationClient};

/// Source of job-status snapshots
///
/// Seam between the poll engine and the HTTP client; tests substitute a
/// scripted implementation and drive ticks directly.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Fetch the latest snapshot for a job
    async fn fetch_status(&self, job_id: &str) -> Result<JobSnapshot, ClientError>;
}

#[async_trait]
impl StatusSource for GenerationClient {
    async fn fetch_status(&self, job_id: &str) -> Result<JobSnapshot, ClientError> {
        self.status(job_id).await
    }
}

/// Poll session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionState {
    /// Job accepted, polling not yet started
    Submitted,
    /// Status polling in progress
    Polling,
    /// Terminal success status reached
    Succeeded,
    /// Backend reported FAILED
    Failed,
    /// A status request failed; session stopped without a verdict
    Errored,
    /// Session cancelled before reaching a terminal state
    Cancelled,
}

impl SessionState {
    /// Whether no further transitions are expected
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionState::Submitted | SessionState::Polling)
    }
}

/// State shared between the session handle and its poll task
struct Shared {
    session_id: Uuid,
    job_id: String,
    bus: EventBus,
    token: CancellationToken,
    finished: AtomicBool,
    audio_surfaced: AtomicBool,
    state: Mutex<SessionState>,
}

impl Shared {
    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Claim the one-and-only terminal transition
    ///
    /// Returns false when another caller already finished the session.
    fn finish(&self, state: SessionState) -> bool {
        if self.finished.swap(true, Ordering::SeqCst) {
            return false;
        }
        *self.state.lock().expect("session state lock") = state;
        self.token.cancel();
        true
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock().expect("session state lock") = state;
    }

    fn state(&self) -> SessionState {
        *self.state.lock().expect("session state lock")
    }
}

/// Handle to one active polling cycle
///
/// Owns the session's cancellation token exclusively; dropping the handle
/// leaves the spawned task running until it observes cancellation or a
/// terminal status, so callers route sessions through a [`SessionManager`]
/// (or cancel explicitly) rather than leaking them.
pub struct PollSession {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl PollSession {
    /// Session identifier
    pub fn session_id(&self) -> Uuid {
        self.shared.session_id
    }

    /// Job this session polls
    pub fn job_id(&self) -> &str {
        &self.shared.job_id
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Whether the session reached a terminal state or was cancelled
    pub fn is_finished(&self) -> bool {
        self.shared.is_finished()
    }

    /// Cancel the session
    ///
    /// Idempotent; a no-op when the session already finished. Emits
    /// SessionCancelled only on the call that performed the transition.
    pub fn cancel(&self) {
        if !self.shared.finish(SessionState::Cancelled) {
            return;
        }
        tracing::info!(
            session_id = %self.shared.session_id,
            job_id = %self.shared.job_id,
            "Poll session cancelled"
        );
        self.shared.bus.emit_lossy(AnthemEvent::SessionCancelled {
            session_id: self.shared.session_id,
            job_id: self.shared.job_id.clone(),
            timestamp: Utc::now(),
        });
    }

    /// Wait for the spawned poll task to stop
    ///
    /// Returns immediately for manually driven sessions.
    pub async fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

/// Polling engine: applies status snapshots against a step table
///
/// One engine serves any number of sequential sessions; each session gets
/// its own token, ticker and state.
pub struct PollEngine {
    source: Arc<dyn StatusSource>,
    table: Arc<StatusTable>,
    bus: EventBus,
    interval: Duration,
}

impl PollEngine {
    pub fn new(
        source: Arc<dyn StatusSource>,
        table: StatusTable,
        bus: EventBus,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            table: Arc::new(table),
            bus,
            interval,
        }
    }

    /// Start polling a job on the configured interval
    ///
    /// The first poll fires one interval after start, matching the cadence
    /// of the submission acknowledgement.
    pub fn start(&self, job_id: impl Into<String>) -> PollSession {
        let (mut session, ticker) = self.session(job_id);

        let interval = self.interval;
        let token = ticker.shared.token.clone();
        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut timer = tokio::time::interval_at(start, interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = timer.tick() => {
                        if !ticker.tick().await {
                            break;
                        }
                    }
                }
            }
        });

        session.handle = Some(handle);
        session
    }

    /// Create a session without spawning a timer task
    ///
    /// The returned [`PollTicker`] is driven tick-by-tick by the caller;
    /// used by tests to simulate the timer.
    pub fn session(&self, job_id: impl Into<String>) -> (PollSession, PollTicker) {
        let job_id = job_id.into();
        let shared = Arc::new(Shared {
            session_id: Uuid::new_v4(),
            job_id,
            bus: self.bus.clone(),
            token: CancellationToken::new(),
            finished: AtomicBool::new(false),
            audio_surfaced: AtomicBool::new(false),
            state: Mutex::new(SessionState::Submitted),
        });

        tracing::info!(
            session_id = %shared.session_id,
            job_id = %shared.job_id,
            interval_secs = self.interval.as_secs(),
            "Poll session created"
        );

        let session = PollSession {
            shared: shared.clone(),
            handle: None,
        };
        let ticker = PollTicker {
            source: self.source.clone(),
            table: self.table.clone(),
            shared,
        };
        (session, ticker)
    }
}

/// Executes individual poll ticks for one session
pub struct PollTicker {
    source: Arc<dyn StatusSource>,
    table: Arc<StatusTable>,
    shared: Arc<Shared>,
}

impl PollTicker {
    /// Run one poll tick; returns false when polling must stop
    ///
    /// A response that arrives after the session finished (terminal state
    /// or cancellation) is discarded without touching any state.
    pub async fn tick(&self) -> bool {
        if self.shared.is_finished() {
            return false;
        }
        if self.shared.state() == SessionState::Submitted {
            self.shared.set_state(SessionState::Polling);
        }

        match self.source.fetch_status(&self.shared.job_id).await {
            Ok(snapshot) => {
                if self.shared.is_finished() {
                    tracing::debug!(
                        job_id = %self.shared.job_id,
                        "Discarding snapshot received after session finished"
                    );
                    return false;
                }
                self.apply(&snapshot)
            }
            Err(err) => {
                if self.shared.is_finished() {
                    return false;
                }
                self.errored(err)
            }
        }
    }

    /// Apply one snapshot against the step table
    ///
    /// A status with no matching step leaves the session untouched this
    /// tick: no progress event, no transition, polling continues.
    fn apply(&self, snapshot: &JobSnapshot) -> bool {
        let step = snapshot.status().and_then(|status| self.table.find(status));
        let Some(step) = step else {
            tracing::debug!(
                job_id = %self.shared.job_id,
                raw_status = ?snapshot.raw_status,
                "No matching status step, continuing to poll"
            );
            return true;
        };

        self.shared.bus.emit_lossy(AnthemEvent::ProgressUpdated {
            session_id: self.shared.session_id,
            job_id: self.shared.job_id.clone(),
            status: step.status.as_wire().to_string(),
            progress: step.progress,
            message: step.message.clone(),
            timestamp: Utc::now(),
        });

        match step.outcome {
            StepOutcome::Continue => {
                // Surface the partial audio asset once, while video work continues
                if let Some(audio_url) = &snapshot.audio_url {
                    if !self.shared.audio_surfaced.swap(true, Ordering::SeqCst) {
                        tracing::info!(
                            job_id = %self.shared.job_id,
                            audio_url = %audio_url,
                            "Partial audio available"
                        );
                        self.shared.bus.emit_lossy(AnthemEvent::PartialAudioReady {
                            session_id: self.shared.session_id,
                            job_id: self.shared.job_id.clone(),
                            audio_url: audio_url.clone(),
                            timestamp: Utc::now(),
                        });
                    }
                }
                true
            }
            StepOutcome::Success => {
                if self.shared.finish(SessionState::Succeeded) {
                    tracing::info!(
                        session_id = %self.shared.session_id,
                        job_id = %self.shared.job_id,
                        "Generation complete"
                    );
                    self.shared.bus.emit_lossy(AnthemEvent::SessionSucceeded {
                        session_id: self.shared.session_id,
                        job_id: self.shared.job_id.clone(),
                        snapshot: snapshot.clone(),
                        timestamp: Utc::now(),
                    });
                }
                false
            }
            StepOutcome::Failure => {
                if self.shared.finish(SessionState::Failed) {
                    tracing::warn!(
                        session_id = %self.shared.session_id,
                        job_id = %self.shared.job_id,
                        "Generation failed"
                    );
                    self.shared.bus.emit_lossy(AnthemEvent::SessionFailed {
                        session_id: self.shared.session_id,
                        job_id: self.shared.job_id.clone(),
                        snapshot: Some(snapshot.clone()),
                        timestamp: Utc::now(),
                    });
                }
                false
            }
        }
    }

    /// Stop the session after a transport or decode failure
    fn errored(&self, err: ClientError) -> bool {
        if self.shared.finish(SessionState::Errored) {
            tracing::error!(
                session_id = %self.shared.session_id,
                job_id = %self.shared.job_id,
                error = %err,
                "Status polling failed"
            );
            self.shared.bus.emit_lossy(AnthemEvent::SessionErrored {
                session_id: self.shared.session_id,
                job_id: self.shared.job_id.clone(),
                detail: err.to_string(),
                timestamp: Utc::now(),
            });
        }
        false
    }
}

/// Owner of the single active poll session
///
/// Starting a new session cancels any prior one first, so at most one
/// timer is ever live and a superseded job's poller cannot keep issuing
/// requests in the background.
#[derive(Default)]
pub struct SessionManager {
    active: Mutex<Option<PollSession>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a new active session, cancelling any prior one
    pub fn install(&self, session: PollSession) {
        let mut active = self.active.lock().expect("session manager lock");
        if let Some(prev) = active.take() {
            if !prev.is_finished() {
                tracing::info!(
                    prev_job_id = %prev.job_id(),
                    new_job_id = %session.job_id(),
                    "Superseding active poll session"
                );
            }
            prev.cancel();
        }
        *active = Some(session);
    }

    /// Whether a session is installed and still running
    pub fn has_active(&self) -> bool {
        self.active
            .lock()
            .expect("session manager lock")
            .as_ref()
            .map(|s| !s.is_finished())
            .unwrap_or(false)
    }

    /// Cancel and drop the active session, if any
    pub fn cancel_active(&self) {
        if let Some(session) = self.active.lock().expect("session manager lock").take() {
            session.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_state_terminality() {
        assert!(!SessionState::Submitted.is_terminal());
        assert!(!SessionState::Polling.is_terminal());
        assert!(SessionState::Succeeded.is_terminal());
        assert!(SessionState::Failed.is_terminal());
        assert!(SessionState::Errored.is_terminal());
        assert!(SessionState::Cancelled.is_terminal());
    }

    #[test]
    fn test_session_state_serializes_uppercase() {
        let json = serde_json::to_string(&SessionState::Polling).unwrap();
        assert_eq!(json, "\"POLLING\"");
    }
}
