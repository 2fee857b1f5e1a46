//! Session replay
//!
//! Feeds a recorded frame stream (JSON list of [`ScriptedFrame`]) through a
//! live [`SessionRunner`] and collects the events it publishes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use alerting::{AlertManager, LogSink};
use anyhow::Context;
use driver_auth::ProfileSet;
use serde::Serialize;
use session::{
    ScriptedBackend, ScriptedFrame, SessionConfig, SessionEvent, SessionRunner, SessionSnapshot,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Set to log as JSON lines instead of plain text
const JSON_LOG_ENV: &str = "DMS_LOG_JSON";

/// Input files
#[derive(Debug, Clone)]
pub struct ReplayArgs {
    pub frames: PathBuf,
    pub profiles: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

/// What happened during the replay
#[derive(Debug, Serialize)]
pub struct ReplaySummary {
    pub frames: usize,
    pub events: Vec<SessionEvent>,
    pub final_snapshot: SessionSnapshot,
}

/// Initialize logging
pub fn init_logging() -> anyhow::Result<()> {
    let builder = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .with_writer(std::io::stderr);

    let result = if std::env::var_os(JSON_LOG_ENV).is_some() {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    result.context("Failed to set tracing subscriber")
}

pub fn load_frames(path: &Path) -> anyhow::Result<Vec<ScriptedFrame>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading frames from {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing frames in {}", path.display()))
}

pub fn load_profiles(path: &Path) -> anyhow::Result<ProfileSet> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading profiles from {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing profiles in {}", path.display()))
}

/// Play every frame through a session at the configured tick rate
pub async fn run_replay(args: &ReplayArgs) -> anyhow::Result<ReplaySummary> {
    let config = SessionConfig::load(args.config.as_deref())?;
    let frames = load_frames(&args.frames)?;
    let profiles = match &args.profiles {
        Some(path) => load_profiles(path)?,
        None => ProfileSet::default(),
    };
    info!(
        "Replaying {} frames against {} profiles",
        frames.len(),
        profiles.len()
    );

    replay_frames(config, Arc::new(profiles), frames).await
}

/// Run `frames` through a fresh session until the backend has played all of
/// them. Late ticks only slow the replay down; no frame is skipped.
pub async fn replay_frames(
    config: SessionConfig,
    profiles: Arc<ProfileSet>,
    frames: Vec<ScriptedFrame>,
) -> anyhow::Result<ReplaySummary> {
    let frame_count = frames.len();
    let tick = Duration::from_millis(config.tick_interval_ms);
    let backend = ScriptedBackend::new(frames);
    let mut progress = backend.progress();
    let (runner, handle) = SessionRunner::new(
        config,
        profiles,
        backend,
        AlertManager::new(Box::new(LogSink)),
    );

    let mut events = handle.subscribe();
    let collector = tokio::spawn(async move {
        let mut seen = Vec::new();
        loop {
            match events.recv().await {
                Ok(event) => {
                    info!("Event: {:?}", event);
                    seen.push(event);
                }
                Err(RecvError::Lagged(n)) => warn!("Dropped {} events", n),
                Err(RecvError::Closed) => break,
            }
        }
        seen
    });

    let task = runner.spawn();
    handle.activate().await?;
    progress
        .wait_for(|&played| played >= frame_count)
        .await
        .context("session runner stopped before the last frame")?;
    // One more tick so a recognition started on the last frame can land
    tokio::time::sleep(tick).await;
    let played = *progress.borrow();
    let final_snapshot = handle.snapshot();

    handle.shutdown().await?;
    task.await.context("session runner panicked")?;
    drop(handle);
    let events = collector.await.context("event collector panicked")?;

    Ok(ReplaySummary {
        frames: played,
        events,
        final_snapshot,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed_eyes_frame() -> ScriptedFrame {
        serde_json::from_str(
            r#"{"kind": "face",
                "bbox": {"x": 0, "y": 0, "width": 100, "height": 100},
                "left_eye":  [{"x":0,"y":0},{"x":10,"y":-1},{"x":20,"y":-1},{"x":30,"y":0},{"x":20,"y":1},{"x":10,"y":1}],
                "right_eye": [{"x":0,"y":0},{"x":10,"y":-1},{"x":20,"y":-1},{"x":30,"y":0},{"x":20,"y":1},{"x":10,"y":1}]}"#,
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_collects_drowsiness_episode() {
        let mut frames = vec![closed_eyes_frame(); 20];
        frames.push(ScriptedFrame::NoFace);

        let summary = replay_frames(SessionConfig::default(), Arc::default(), frames)
            .await
            .unwrap();

        assert_eq!(summary.frames, 21);
        assert_eq!(
            summary.events,
            vec![
                SessionEvent::DrowsinessStarted { alert_count: 1 },
                SessionEvent::DrowsinessEnded,
            ]
        );
        assert!(!summary.final_snapshot.is_drowsy);
        assert_eq!(summary.final_snapshot.alert_count, 1);
    }

    #[tokio::test]
    async fn test_every_frame_played_on_a_real_clock() {
        let config = SessionConfig {
            tick_interval_ms: 1,
            ..SessionConfig::default()
        };
        let mut frames = vec![closed_eyes_frame(); 60];
        frames.push(ScriptedFrame::NoFace);

        let summary = replay_frames(config, Arc::default(), frames).await.unwrap();

        assert_eq!(summary.frames, 61);
        assert_eq!(
            summary.events,
            vec![
                SessionEvent::DrowsinessStarted { alert_count: 1 },
                SessionEvent::DrowsinessEnded,
            ]
        );
        assert_eq!(summary.final_snapshot.consecutive_closed_frames, 0);
    }

    #[test]
    fn test_missing_frames_file() {
        let err = load_frames(Path::new("/nonexistent/frames.json")).unwrap_err();
        assert!(err.to_string().contains("reading frames"));
    }
}
