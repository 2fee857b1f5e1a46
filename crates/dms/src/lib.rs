//! Driver Monitoring System (DMS)
//!
//! Per-frame driver state analysis from facial landmarks:
//! - Eye aspect ratio (EAR) from eye landmark geometry
//! - Debounced drowsiness alarm over consecutive closed-eye frames

pub mod config;
pub mod geometry;
pub mod state;

pub use config::DmsConfig;
pub use geometry::{average_ear, eye_aspect_ratio, EyeLandmarks, FaceBbox, Point, EAR_SENTINEL};
pub use state::{DrowsinessMonitor, DrowsinessReading, DrowsinessState, DrowsinessTransition};

use thiserror::Error;

/// DMS error types
#[derive(Error, Debug)]
pub enum DmsError {
    #[error("Configuration error: {0}")]
    Config(String),
}
