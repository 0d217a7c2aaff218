//! Integration tests for the poll engine and session management
//!
//! Uses a scripted status source and directly driven ticks instead of real
//! timers, so state-machine behavior is tested deterministically. Timer
//! behavior itself (spawned sessions, supersession) runs with millisecond
//! intervals.

use anthem_common::events::{AnthemEvent, EventBus};
use anthem_common::model::JobSnapshot;
use anthem_common::steps::{PipelineProfile, StatusTable};
use anthem_ui::client::ClientError;
use anthem_ui::poller::{PollEngine, SessionManager, SessionState, StatusSource};
use anthem_ui::render::ResultView;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;

fn snapshot(status: &str) -> JobSnapshot {
    JobSnapshot {
        raw_status: Some(status.to_string()),
        ..Default::default()
    }
}

fn audio_ready() -> JobSnapshot {
    JobSnapshot {
        raw_status: Some("AUDIO_READY".to_string()),
        audio_url: Some("https://cdn.example/a.mp3".to_string()),
        ..Default::default()
    }
}

fn video_ready() -> JobSnapshot {
    JobSnapshot {
        raw_status: Some("VIDEO_READY".to_string()),
        audio_url: Some("https://cdn.example/a.mp3".to_string()),
        video_url: Some("https://cdn.example/v.mp4".to_string()),
        ..Default::default()
    }
}

/// Scripted status source: pops one queued response per fetch
///
/// An exhausted script keeps answering PENDING so spawned timers have
/// something harmless to chew on.
struct ScriptedSource {
    responses: Mutex<VecDeque<Result<JobSnapshot, ClientError>>>,
    fetches: AtomicUsize,
}

impl ScriptedSource {
    fn new(responses: Vec<Result<JobSnapshot, ClientError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            fetches: AtomicUsize::new(0),
        })
    }

    fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusSource for ScriptedSource {
    async fn fetch_status(&self, _job_id: &str) -> Result<JobSnapshot, ClientError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(snapshot("PENDING")))
    }
}

/// Status source that parks every fetch until released
struct GatedSource {
    gate: tokio::sync::Notify,
}

#[async_trait]
impl StatusSource for GatedSource {
    async fn fetch_status(&self, _job_id: &str) -> Result<JobSnapshot, ClientError> {
        self.gate.notified().await;
        Ok(video_ready())
    }
}

fn engine(source: Arc<dyn StatusSource>, table: StatusTable, bus: &EventBus) -> PollEngine {
    PollEngine::new(source, table, bus.clone(), Duration::from_millis(5))
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<AnthemEvent>) -> Vec<AnthemEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            Err(TryRecvError::Lagged(_)) => continue,
        }
    }
    events
}

#[tokio::test]
async fn unknown_status_leaves_session_unchanged() {
    let bus = EventBus::new(64);
    let mut rx = bus.subscribe();
    let source = ScriptedSource::new(vec![Ok(snapshot("MASTERING")), Ok(snapshot("PENDING"))]);
    let engine = engine(source.clone(), StatusTable::audio_video(), &bus);
    let (session, ticker) = engine.session("job-1");

    // Unknown status: no event, no transition, polling continues
    assert!(ticker.tick().await);
    assert_eq!(session.state(), SessionState::Polling);
    assert!(drain(&mut rx).is_empty());

    // The session is still alive and processes the next tick normally
    assert!(ticker.tick().await);
    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        AnthemEvent::ProgressUpdated { progress: 10, .. }
    ));
    assert_eq!(source.fetch_count(), 2);
}

#[tokio::test]
async fn terminal_success_cancels_exactly_once() {
    let bus = EventBus::new(64);
    let mut rx = bus.subscribe();
    let source = ScriptedSource::new(vec![Ok(snapshot("PENDING")), Ok(video_ready())]);
    let engine = engine(source.clone(), StatusTable::audio_video(), &bus);
    let (session, ticker) = engine.session("job-1");

    assert!(ticker.tick().await);
    assert!(!ticker.tick().await);
    assert_eq!(session.state(), SessionState::Succeeded);
    assert!(session.is_finished());

    // Simulated ticks after the terminal state: no fetches, no events
    let fetches_at_terminal = source.fetch_count();
    assert!(!ticker.tick().await);
    assert!(!ticker.tick().await);
    assert_eq!(source.fetch_count(), fetches_at_terminal);

    let succeeded = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, AnthemEvent::SessionSucceeded { .. }))
        .count();
    assert_eq!(succeeded, 1);

    // Cancelling an already-finished session is a no-op
    session.cancel();
    assert_eq!(session.state(), SessionState::Succeeded);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn full_audio_video_round_trip() {
    let bus = EventBus::new(64);
    let mut rx = bus.subscribe();
    let source = ScriptedSource::new(vec![
        Ok(snapshot("PENDING")),
        Ok(audio_ready()),
        Ok(video_ready()),
    ]);
    let engine = engine(source, StatusTable::audio_video(), &bus);
    let (session, ticker) = engine.session("job-1");

    assert!(ticker.tick().await);
    assert!(ticker.tick().await);
    assert!(!ticker.tick().await);
    assert_eq!(session.state(), SessionState::Succeeded);

    let events = drain(&mut rx);
    // Intermediate AUDIO_READY surfaced the partial asset while polling went on
    assert!(events
        .iter()
        .any(|e| matches!(e, AnthemEvent::PartialAudioReady { audio_url, .. }
            if audio_url == "https://cdn.example/a.mp3")));

    let final_snapshot = events
        .iter()
        .find_map(|e| match e {
            AnthemEvent::SessionSucceeded { snapshot, .. } => Some(snapshot.clone()),
            _ => None,
        })
        .expect("success event");

    let view = ResultView::success(&final_snapshot);
    assert_eq!(view.audio_url.as_deref(), Some("https://cdn.example/a.mp3"));
    assert_eq!(view.video_url.as_deref(), Some("https://cdn.example/v.mp4"));
    // Download target prefers the video
    assert_eq!(view.download_url.as_deref(), Some("https://cdn.example/v.mp4"));
}

#[tokio::test]
async fn audio_only_pipeline_treats_audio_ready_as_terminal() {
    let bus = EventBus::new(64);
    let mut rx = bus.subscribe();
    let source = ScriptedSource::new(vec![Ok(snapshot("PENDING")), Ok(audio_ready())]);
    let engine = engine(source, PipelineProfile::AudioOnly.table(), &bus);
    let (session, ticker) = engine.session("job-1");

    assert!(ticker.tick().await);
    assert!(!ticker.tick().await);
    assert_eq!(session.state(), SessionState::Succeeded);

    let events = drain(&mut rx);
    // Terminal AUDIO_READY renders the result; no partial-asset event
    assert!(!events
        .iter()
        .any(|e| matches!(e, AnthemEvent::PartialAudioReady { .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, AnthemEvent::SessionSucceeded { .. })));
}

#[tokio::test]
async fn failed_status_renders_failure_without_sources() {
    let bus = EventBus::new(64);
    let mut rx = bus.subscribe();
    let source = ScriptedSource::new(vec![Ok(snapshot("PENDING")), Ok(snapshot("FAILED"))]);
    let engine = engine(source, StatusTable::audio_video(), &bus);
    let (session, ticker) = engine.session("job-1");

    assert!(ticker.tick().await);
    assert!(!ticker.tick().await);
    assert_eq!(session.state(), SessionState::Failed);

    let failed_snapshot = drain(&mut rx)
        .into_iter()
        .find_map(|e| match e {
            AnthemEvent::SessionFailed { snapshot, .. } => Some(snapshot),
            _ => None,
        })
        .expect("failure event");

    let view = ResultView::failure(failed_snapshot.as_ref());
    assert!(!view.succeeded);
    assert_eq!(view.heading, "Generation Failed");
    assert!(view.audio_url.is_none());
    assert!(view.video_url.is_none());
    assert!(view.download_url.is_none());
}

#[tokio::test]
async fn transport_error_stops_polling_like_a_failure() {
    let bus = EventBus::new(64);
    let mut rx = bus.subscribe();
    let source = ScriptedSource::new(vec![
        Ok(snapshot("PENDING")),
        Err(ClientError::StatusCheck(500)),
    ]);
    let engine = engine(source.clone(), StatusTable::audio_video(), &bus);
    let (session, ticker) = engine.session("job-1");

    assert!(ticker.tick().await);
    assert!(!ticker.tick().await);
    assert_eq!(session.state(), SessionState::Errored);

    // Stopped: later ticks fetch nothing
    let fetches = source.fetch_count();
    assert!(!ticker.tick().await);
    assert_eq!(source.fetch_count(), fetches);

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        AnthemEvent::SessionErrored { detail, .. } if detail.contains("500")
    )));
}

#[tokio::test]
async fn new_submission_supersedes_active_session() {
    let bus = EventBus::new(64);
    let mut rx = bus.subscribe();
    let source = ScriptedSource::new(vec![]);
    let engine = engine(source.clone(), StatusTable::audio_video(), &bus);
    let manager = SessionManager::new();

    let first = engine.start("job-1");
    let first_id = first.session_id();
    manager.install(first);
    assert!(manager.has_active());

    // Let the first session poll a few times
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(source.fetch_count() >= 1);

    manager.install(engine.start("job-2"));
    assert!(manager.has_active());

    // The superseded session announced its cancellation, exactly once
    tokio::time::sleep(Duration::from_millis(30)).await;
    let cancelled: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            AnthemEvent::SessionCancelled { session_id, job_id, .. } => Some((session_id, job_id)),
            _ => None,
        })
        .collect();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0], (first_id, "job-1".to_string()));

    // Only job-2's timer is live now: fetch counts keep moving for it alone
    manager.cancel_active();
    tokio::time::sleep(Duration::from_millis(30)).await;
    let settled = source.fetch_count();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(source.fetch_count(), settled);
}

#[tokio::test]
async fn response_arriving_after_cancellation_is_discarded() {
    let bus = EventBus::new(64);
    let mut rx = bus.subscribe();
    let source = Arc::new(GatedSource {
        gate: tokio::sync::Notify::new(),
    });
    let engine = PollEngine::new(
        source.clone(),
        StatusTable::audio_video(),
        bus.clone(),
        Duration::from_millis(5),
    );
    let (session, ticker) = engine.session("job-1");

    // Fetch goes in flight, then the session is cancelled underneath it
    let tick = tokio::spawn(async move { ticker.tick().await });
    tokio::task::yield_now().await;
    session.cancel();
    source.gate.notify_one();

    assert!(!tick.await.unwrap());
    assert_eq!(session.state(), SessionState::Cancelled);

    // The late VIDEO_READY response must not render a result
    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, AnthemEvent::SessionCancelled { .. })));
    assert!(!events
        .iter()
        .any(|e| matches!(e, AnthemEvent::SessionSucceeded { .. })));
}

#[tokio::test]
async fn spawned_session_reaches_terminal_state() {
    let bus = EventBus::new(64);
    let mut rx = bus.subscribe();
    let source = ScriptedSource::new(vec![
        Ok(snapshot("PENDING")),
        Ok(audio_ready()),
        Ok(video_ready()),
    ]);
    let engine = engine(source, StatusTable::audio_video(), &bus);

    let mut session = engine.start("job-1");
    session.join().await;

    assert_eq!(session.state(), SessionState::Succeeded);
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, AnthemEvent::SessionSucceeded { .. })));
}
