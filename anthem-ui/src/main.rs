//! anthem-ui - Song Generation Client
//!
//! Submits lyrics to the generation backend, then polls job status on a
//! fixed interval, printing progress until the anthem is ready (or the
//! job fails). Pipeline shape and polling cadence come from configuration.

use anthem_common::config::{Config, ConfigOverrides};
use anthem_common::events::{AnthemEvent, EventBus};
use anthem_common::model::{Genre, Language, Mood, SongPrompt};
use anthem_common::steps::PipelineProfile;
use anthem_ui::client::GenerationClient;
use anthem_ui::flow::StageFlow;
use anthem_ui::poller::{PollEngine, SessionManager, StatusSource};
use anthem_ui::render::ResultView;
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Generate a song from lyrics via the Anthem backend
#[derive(Debug, Parser)]
#[command(name = "anthem-ui", version, about)]
struct Args {
    /// Lyrics text (reads stdin when neither this nor --lyrics-file is given)
    #[arg(long, conflicts_with = "lyrics_file")]
    lyrics: Option<String>,

    /// Read lyrics from a file
    #[arg(long)]
    lyrics_file: Option<PathBuf>,

    /// Optional song title
    #[arg(long)]
    title: Option<String>,

    /// Genre: afrobeats, highlife, gengetone, amapiano, pop, hiphop
    #[arg(long, default_value = "afrobeats")]
    genre: Genre,

    /// Mood: celebratory, resilience, love, harvest, protest, reflection
    #[arg(long, default_value = "celebratory")]
    mood: Mood,

    /// Lyric language: English, Luganda, Swahili, Yoruba, French, Arabic
    #[arg(long, default_value = "English")]
    language: Language,

    /// Requested voice type, if the backend supports one
    #[arg(long)]
    voice_type: Option<String>,

    /// List the song publicly (allows others to remix it)
    #[arg(long)]
    public: bool,

    /// Remix an existing song by job id instead of creating a fresh one
    #[arg(long)]
    remix_of: Option<String>,

    /// Backend API base URL (overrides env and config file)
    #[arg(long)]
    base_url: Option<String>,

    /// Configuration file path
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seconds between status polls
    #[arg(long)]
    poll_interval_secs: Option<u64>,

    /// Backend pipeline shape: audio_video or audio_only
    #[arg(long)]
    pipeline: Option<PipelineProfile>,

    /// CSRF token to use instead of priming the cookie jar
    #[arg(long)]
    csrf_token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::resolve(ConfigOverrides {
        config_path: args.config.clone(),
        base_url: args.base_url.clone(),
        poll_interval_secs: args.poll_interval_secs,
        pipeline: args.pipeline,
        csrf_token: args.csrf_token.clone(),
    })?;

    init_tracing(&config)?;

    info!("Starting anthem-ui (Song Generation Client)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Backend: {}", config.base_url);
    info!(
        "Pipeline: {:?}, poll interval: {}s",
        config.pipeline, config.poll_interval_secs
    );

    let lyrics = read_lyrics(&args)?;
    let prompt = SongPrompt {
        title: args.title.clone(),
        lyrics,
        genre: args.genre,
        mood: args.mood,
        language: args.language,
        voice_type: args.voice_type.clone(),
        is_public: args.public,
        remix_of: args.remix_of.clone(),
    };

    // Local validation: an invalid prompt never reaches the network
    if let Err(e) = prompt.validate() {
        bail!("{e}");
    }

    let client = Arc::new(GenerationClient::new(
        &config.base_url,
        config.csrf_token.clone(),
    )?);
    client
        .prime_csrf()
        .await
        .context("Failed to acquire CSRF token from backend")?;

    let bus = EventBus::new(100);
    let mut rx = bus.subscribe();
    let mut flow = StageFlow::new();

    // Optimistic: Processing before the submission response lands
    flow.begin_submission();
    println!("Submitting your song request...");

    let job_id = match submit(&client, &args, &prompt).await {
        Ok(job_id) => job_id,
        Err(e) => {
            error!("Submission failed: {e}");
            eprintln!("Error: {e}");
            tokio::time::sleep(config.reset_delay()).await;
            flow.reset_to_input();
            std::process::exit(2);
        }
    };

    bus.emit_lossy(AnthemEvent::SubmissionAccepted {
        job_id: job_id.clone(),
        remix_of: args.remix_of.clone(),
        timestamp: chrono::Utc::now(),
    });
    println!("Song request submitted. ID: {job_id}");

    let engine = PollEngine::new(
        client.clone() as Arc<dyn StatusSource>,
        config.pipeline.table(),
        bus.clone(),
        config.poll_interval(),
    );
    let manager = SessionManager::new();
    manager.install(engine.start(job_id.as_str()));

    let mut last_progress: Option<(String, u8)> = None;
    let exit_code = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, cancelling poll session");
                manager.cancel_active();
            }
            event = rx.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break 2,
                };
                match event {
                    AnthemEvent::ProgressUpdated { status, progress, message, .. } => {
                        // identical consecutive ticks stay quiet
                        let key = (status, progress);
                        if last_progress.as_ref() != Some(&key) {
                            println!("[{progress:>3}%] {message}");
                            last_progress = Some(key);
                        }
                    }
                    AnthemEvent::PartialAudioReady { audio_url, .. } => {
                        println!("Audio preview available: {audio_url}");
                    }
                    AnthemEvent::SessionSucceeded { snapshot, .. } => {
                        flow.show_result();
                        print_result(&ResultView::success(&snapshot));
                        break 0;
                    }
                    AnthemEvent::SessionFailed { snapshot, .. } => {
                        flow.show_result();
                        print_result(&ResultView::failure(snapshot.as_ref()));
                        break 1;
                    }
                    AnthemEvent::SessionErrored { detail, .. } => {
                        flow.show_result();
                        print_result(&ResultView::failure(None));
                        eprintln!("Polling failed: {detail}");
                        break 2;
                    }
                    AnthemEvent::SessionCancelled { .. } => {
                        println!("Cancelled.");
                        break 130;
                    }
                    AnthemEvent::SubmissionAccepted { .. } => {}
                }
            }
        }
    };

    std::process::exit(exit_code);
}

/// Initialize tracing from RUST_LOG, falling back to the configured level
fn init_tracing(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match &config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

/// Lyrics from --lyrics, --lyrics-file, or stdin
fn read_lyrics(args: &Args) -> Result<String> {
    if let Some(lyrics) = &args.lyrics {
        return Ok(lyrics.clone());
    }
    if let Some(path) = &args.lyrics_file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read lyrics file {}", path.display()));
    }

    eprintln!("Reading lyrics from stdin (end with EOF)...");
    let mut lyrics = String::new();
    std::io::stdin()
        .read_to_string(&mut lyrics)
        .context("Failed to read lyrics from stdin")?;
    Ok(lyrics)
}

/// Submit the prompt, as a remix when --remix-of was given
async fn submit(client: &GenerationClient, args: &Args, prompt: &SongPrompt) -> Result<String> {
    if let Some(original_id) = &args.remix_of {
        let receipt = client.remix(original_id, prompt).await?;
        if let Some(title) = &receipt.original_title {
            println!("Remixing \"{title}\"...");
        }
        Ok(receipt.id)
    } else {
        let receipt = client.submit(prompt).await?;
        if let Some(message) = &receipt.message {
            println!("{message}");
        }
        Ok(receipt.id)
    }
}

fn print_result(view: &ResultView) {
    println!();
    println!("=== {} ===", view.heading);
    if let Some(lineage) = &view.remix_lineage {
        println!("{}", lineage.label());
    }
    if let Some(url) = &view.audio_url {
        println!("Audio:    {url}");
    }
    if let Some(url) = &view.video_url {
        println!("Video:    {url}");
    }
    if let Some(url) = &view.download_url {
        println!("Download: {url}");
    }
    if let Some(secs) = view.duration_seconds {
        println!("Duration: {secs}s");
    }
}
