//! Driver Session
//!
//! Per-frame orchestration of a detection run:
//! - Eye aspect ratio and drowsiness alarm on every frame
//! - Driver recognition throttled to a fixed cadence, off the tick path
//! - Snapshots and state-change events for the UI and alarm outputs

pub mod config;
pub mod controller;
pub mod events;
pub mod runner;
pub mod vision;

pub use config::{RecognitionConfig, SessionConfig};
pub use controller::{
    RecognitionJob, RecognitionOutcome, RecognitionResult, SessionController, TickOutcome,
};
pub use events::{RecognizedUser, SessionEvent, SessionSnapshot};
pub use runner::{SessionCommand, SessionHandle, SessionRunner};
pub use vision::{
    DescriptorRequest, FaceObservation, ScriptedBackend, ScriptedFrame, VisionBackend, VisionError,
};

use thiserror::Error;

/// Session error types
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    #[error(transparent)]
    Dms(#[from] dms::DmsError),

    #[error("Session runner stopped")]
    ChannelClosed,
}
