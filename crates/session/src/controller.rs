//! Session controller
//!
//! Deterministic per-tick step from (session state, observation, now) to
//! (snapshot, events, optional recognition job). Descriptor extraction and
//! matching run elsewhere; their result is fed back through
//! [`SessionController::complete_recognition`].

use std::sync::Arc;
use std::time::Duration;

use dms::{DrowsinessMonitor, DrowsinessTransition};
use driver_auth::{best_match, Descriptor, ProfileSet};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::events::{RecognizedUser, SessionEvent, SessionSnapshot};
use crate::vision::{FaceObservation, VisionError};

/// Recognition work handed out by the controller
#[derive(Debug, Clone)]
pub struct RecognitionJob {
    id: u64,
    profiles: Arc<ProfileSet>,
    threshold: f32,
}

impl RecognitionJob {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Extract the descriptor with `extract`, then run the
    /// nearest-neighbour search against the profile snapshot
    pub fn run(
        &self,
        extract: impl FnOnce() -> Result<Option<Descriptor>, VisionError>,
    ) -> RecognitionResult {
        let outcome = match extract() {
            Ok(Some(descriptor)) => self.match_descriptor(&descriptor),
            Ok(None) => RecognitionOutcome::NoDescriptor,
            Err(e) => {
                warn!(job = self.id, "Descriptor extraction failed: {}", e);
                RecognitionOutcome::Failed
            }
        };
        RecognitionResult {
            job_id: self.id,
            outcome,
        }
    }

    fn match_descriptor(&self, descriptor: &Descriptor) -> RecognitionOutcome {
        match best_match(descriptor, &self.profiles, self.threshold) {
            Some(m) => RecognitionOutcome::Matched(RecognizedUser {
                id: m.profile.id(),
                name: m.profile.name().to_string(),
                distance: m.distance,
            }),
            None => RecognitionOutcome::NoMatch,
        }
    }
}

/// Result of a recognition job
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionOutcome {
    Matched(RecognizedUser),
    NoMatch,
    /// The backend could not encode the face; identity is left unchanged
    NoDescriptor,
    /// The job died before producing an answer; identity is left unchanged
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionResult {
    pub job_id: u64,
    pub outcome: RecognitionOutcome,
}

/// Output of one tick
#[derive(Debug)]
pub struct TickOutcome {
    pub snapshot: SessionSnapshot,
    pub events: Vec<SessionEvent>,
    /// Recognition to start now, if it was due
    pub recognition: Option<RecognitionJob>,
}

/// Owns the session state of one detection run
pub struct SessionController {
    config: SessionConfig,
    profiles: Arc<ProfileSet>,
    active: bool,
    show_visualization: bool,
    monitor: DrowsinessMonitor,
    recognized: Option<RecognizedUser>,
    last_recognition: Option<Instant>,
    /// Start of the current no-face stretch
    face_lost_at: Option<Instant>,
    in_flight: Option<u64>,
    next_job_id: u64,
}

impl SessionController {
    pub fn new(config: SessionConfig, profiles: Arc<ProfileSet>) -> Self {
        Self {
            monitor: DrowsinessMonitor::new(config.dms.clone()),
            show_visualization: config.show_visualization,
            config,
            profiles,
            active: false,
            recognized: None,
            last_recognition: None,
            face_lost_at: None,
            in_flight: None,
            next_job_id: 1,
        }
    }

    /// Start a detection run with fresh state
    pub fn activate(&mut self) {
        if self.active {
            return;
        }
        self.reset();
        self.active = true;
        info!(profiles = self.profiles.len(), "Detection activated");
    }

    /// Stop the run. Any recognition still in flight is orphaned and its
    /// result will be discarded.
    pub fn deactivate(&mut self) -> Vec<SessionEvent> {
        if !self.active {
            return Vec::new();
        }

        let mut events = Vec::new();
        if self.monitor.is_drowsy() {
            events.push(SessionEvent::DrowsinessEnded);
        }
        if self.recognized.is_some() {
            events.push(SessionEvent::IdentityChanged { user: None });
        }

        self.reset();
        self.active = false;
        info!("Detection deactivated");
        events
    }

    fn reset(&mut self) {
        self.monitor.reset();
        self.recognized = None;
        self.last_recognition = None;
        self.face_lost_at = None;
        self.in_flight = None;
    }

    /// Swap in a new enrolled-profile snapshot
    pub fn set_profiles(&mut self, profiles: Arc<ProfileSet>) {
        info!(profiles = profiles.len(), "Profile set replaced");
        self.profiles = profiles;
    }

    pub fn set_visualization(&mut self, enabled: bool) {
        self.show_visualization = enabled;
    }

    /// Whether a tick with a face at `now` would start a recognition
    pub fn recognition_due(&self, now: Instant) -> bool {
        self.active
            && self.in_flight.is_none()
            && !self.profiles.is_empty()
            && self.last_recognition.map_or(true, |last| {
                now.saturating_duration_since(last) >= self.recognition_interval()
            })
    }

    /// Process one frame
    pub fn tick(
        &mut self,
        now: Instant,
        observed: Result<Option<FaceObservation>, VisionError>,
    ) -> TickOutcome {
        let mut events = Vec::new();
        let mut recognition = None;

        if !self.active {
            return TickOutcome {
                snapshot: self.snapshot(),
                events,
                recognition,
            };
        }

        let observation = match observed {
            Ok(observation) => observation,
            Err(e) => {
                warn!("Treating frame as no face: {}", e);
                None
            }
        };

        match observation {
            None => {
                let transition = self.monitor.update(None);
                events.extend(self.apply_transition(transition));
                self.face_lost_at.get_or_insert(now);
            }
            Some(face) => {
                self.face_lost_at = None;
                let ear = face.average_ear();
                let transition = self.monitor.update(Some(ear));
                events.extend(self.apply_transition(transition));

                if self.recognition_due(now) {
                    recognition = Some(self.start_recognition(now));
                }
            }
        }

        // Also covers a match that landed while the face was already gone
        if let Some(lost) = self.face_lost_at {
            if now >= lost + self.identity_grace() {
                if let Some(previous) = self.recognized.take() {
                    info!("Driver {} left the frame", previous.name);
                    events.push(SessionEvent::IdentityChanged { user: None });
                }
            }
        }

        TickOutcome {
            snapshot: self.snapshot(),
            events,
            recognition,
        }
    }

    fn apply_transition(&self, transition: Option<DrowsinessTransition>) -> Option<SessionEvent> {
        transition.map(|t| match t {
            DrowsinessTransition::Started => SessionEvent::DrowsinessStarted {
                alert_count: self.monitor.alert_count(),
            },
            DrowsinessTransition::Ended => SessionEvent::DrowsinessEnded,
        })
    }

    fn start_recognition(&mut self, now: Instant) -> RecognitionJob {
        let id = self.next_job_id;
        self.next_job_id += 1;
        self.last_recognition = Some(now);
        self.in_flight = Some(id);
        debug!(job = id, "Recognition started");

        RecognitionJob {
            id,
            profiles: Arc::clone(&self.profiles),
            threshold: self.config.recognition.threshold,
        }
    }

    /// Apply a finished recognition. Results of jobs that are no longer
    /// in flight (e.g. issued before a deactivation) are dropped.
    pub fn complete_recognition(&mut self, result: RecognitionResult) -> Vec<SessionEvent> {
        if self.in_flight != Some(result.job_id) {
            debug!(job = result.job_id, "Discarding stale recognition result");
            return Vec::new();
        }
        self.in_flight = None;

        match result.outcome {
            RecognitionOutcome::Matched(user) => {
                if self.recognized.as_ref().map(|u| u.id) == Some(user.id) {
                    self.recognized = Some(user);
                    return Vec::new();
                }
                info!("Driver recognized: {} (distance {:.3})", user.name, user.distance);
                self.recognized = Some(user.clone());
                vec![SessionEvent::IdentityChanged { user: Some(user) }]
            }
            RecognitionOutcome::NoMatch => match self.recognized.take() {
                Some(previous) => {
                    info!("Driver {} no longer recognized", previous.name);
                    vec![SessionEvent::IdentityChanged { user: None }]
                }
                None => Vec::new(),
            },
            RecognitionOutcome::NoDescriptor => {
                debug!(job = result.job_id, "No descriptor for recognition");
                Vec::new()
            }
            RecognitionOutcome::Failed => {
                warn!(job = result.job_id, "Recognition failed");
                Vec::new()
            }
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let reading = self.monitor.reading();
        SessionSnapshot {
            is_active: self.active,
            is_drowsy: self.monitor.is_drowsy(),
            eye_aspect_ratio: reading.average_ear,
            recognized_user_id: self.recognized.as_ref().map(|u| u.id),
            alert_count: self.monitor.alert_count(),
            consecutive_closed_frames: reading.consecutive_closed_frames,
            show_visualization: self.show_visualization,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn recognized_user(&self) -> Option<&RecognizedUser> {
        self.recognized.as_ref()
    }

    pub fn recognition_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn recognition_interval(&self) -> Duration {
        Duration::from_millis(self.config.recognition.interval_ms)
    }

    fn identity_grace(&self) -> Duration {
        Duration::from_millis(self.config.identity_grace_ms)
    }
}
