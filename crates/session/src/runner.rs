//! Session runner
//!
//! Single tick loop around a [`SessionController`]. Descriptor extraction
//! and matching run on the blocking pool and report back over a channel, so
//! a slow recognition never delays the drowsiness path. A backend panic
//! counts as a failed frame.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use alerting::AlertManager;
use driver_auth::ProfileSet;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::controller::{RecognitionJob, RecognitionOutcome, RecognitionResult, SessionController};
use crate::events::{SessionEvent, SessionSnapshot};
use crate::vision::{DescriptorRequest, VisionBackend, VisionError};
use crate::SessionError;

const COMMAND_CAPACITY: usize = 16;
const EVENT_CAPACITY: usize = 64;

/// Requests from the UI side
#[derive(Debug, Clone)]
pub enum SessionCommand {
    Activate,
    Deactivate,
    SetVisualization(bool),
    ReplaceProfiles(Arc<ProfileSet>),
    Shutdown,
}

/// Clone-safe handle to a running session
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    snapshots: watch::Receiver<SessionSnapshot>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    async fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::ChannelClosed)
    }

    pub async fn activate(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Activate).await
    }

    pub async fn deactivate(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Deactivate).await
    }

    pub async fn set_visualization(&self, enabled: bool) -> Result<(), SessionError> {
        self.send(SessionCommand::SetVisualization(enabled)).await
    }

    /// Hand the session a new enrolled-profile snapshot
    pub async fn replace_profiles(&self, profiles: Arc<ProfileSet>) -> Result<(), SessionError> {
        self.send(SessionCommand::ReplaceProfiles(profiles)).await
    }

    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Shutdown).await
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

/// Drives a session from a vision backend
pub struct SessionRunner<B> {
    controller: SessionController,
    backend: B,
    alerts: AlertManager,
    tick_interval: Duration,
    commands: mpsc::Receiver<SessionCommand>,
    completions_tx: mpsc::UnboundedSender<RecognitionResult>,
    completions_rx: mpsc::UnboundedReceiver<RecognitionResult>,
    snapshots: watch::Sender<SessionSnapshot>,
    events: broadcast::Sender<SessionEvent>,
}

impl<B: VisionBackend + 'static> SessionRunner<B> {
    pub fn new(
        config: SessionConfig,
        profiles: Arc<ProfileSet>,
        backend: B,
        alerts: AlertManager,
    ) -> (Self, SessionHandle) {
        let tick_interval = Duration::from_millis(config.tick_interval_ms.max(1));
        let controller = SessionController::new(config, profiles);

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(controller.snapshot());
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);

        let handle = SessionHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
            events: event_tx.clone(),
        };

        let runner = Self {
            controller,
            backend,
            alerts,
            tick_interval,
            commands: command_rx,
            completions_tx,
            completions_rx,
            snapshots: snapshot_tx,
            events: event_tx,
        };
        (runner, handle)
    }

    /// Run the loop on the current runtime
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        info!("Session runner started ({}ms ticks)", self.tick_interval.as_millis());

        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    None | Some(SessionCommand::Shutdown) => break,
                    Some(command) => self.handle_command(command),
                },
                Some(result) = self.completions_rx.recv() => {
                    let events = self.controller.complete_recognition(result);
                    self.publish(events);
                    self.snapshots.send_replace(self.controller.snapshot());
                }
                _ = ticker.tick(), if self.controller.is_active() => {
                    self.tick(Instant::now());
                }
            }
        }

        let events = self.controller.deactivate();
        self.publish(events);
        self.alerts.clear();
        self.snapshots.send_replace(self.controller.snapshot());
        info!("Session runner stopped");
    }

    fn handle_command(&mut self, command: SessionCommand) {
        debug!("Session command: {:?}", command);
        match command {
            SessionCommand::Activate => self.controller.activate(),
            SessionCommand::Deactivate => {
                let events = self.controller.deactivate();
                self.publish(events);
                self.alerts.clear();
            }
            SessionCommand::SetVisualization(enabled) => self.controller.set_visualization(enabled),
            SessionCommand::ReplaceProfiles(profiles) => self.controller.set_profiles(profiles),
            SessionCommand::Shutdown => {}
        }
        self.snapshots.send_replace(self.controller.snapshot());
    }

    fn tick(&mut self, now: Instant) {
        let backend = &mut self.backend;
        let observed = guarded("observe", || backend.observe());
        let outcome = self.controller.tick(now, observed);

        if let Some(job) = outcome.recognition {
            let backend = &mut self.backend;
            match guarded("descriptor_request", || Ok(backend.descriptor_request())) {
                Ok(request) => self.spawn_recognition(job, request),
                Err(e) => {
                    warn!(job = job.id(), "{}", e);
                    let events = self.controller.complete_recognition(RecognitionResult {
                        job_id: job.id(),
                        outcome: RecognitionOutcome::Failed,
                    });
                    self.publish(events);
                }
            }
        }
        self.publish(outcome.events);
        self.snapshots.send_replace(self.controller.snapshot());
    }

    fn spawn_recognition(&self, job: RecognitionJob, request: DescriptorRequest) {
        let completions = self.completions_tx.clone();
        let job_id = job.id();

        tokio::spawn(async move {
            let result = match tokio::task::spawn_blocking(move || job.run(request)).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(job = job_id, "Recognition task aborted: {}", e);
                    RecognitionResult {
                        job_id,
                        outcome: RecognitionOutcome::Failed,
                    }
                }
            };
            // Receiver only goes away when the runner has stopped
            let _ = completions.send(result);
        });
    }

    fn publish(&mut self, events: Vec<SessionEvent>) {
        for event in events {
            match event {
                SessionEvent::DrowsinessStarted { .. } => {
                    self.alerts.raise();
                }
                SessionEvent::DrowsinessEnded => {
                    self.alerts.clear();
                }
                SessionEvent::IdentityChanged { .. } => {}
            }
            // No subscribers is fine
            let _ = self.events.send(event);
        }
    }
}

/// Run a backend call, turning a panic into a backend error
fn guarded<T>(
    call: &str,
    f: impl FnOnce() -> Result<T, VisionError>,
) -> Result<T, VisionError> {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(VisionError::Backend(format!("{} panicked: {}", call, reason)))
    })
}
