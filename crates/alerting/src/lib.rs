//! Alerting System
//!
//! Drives the drowsiness alarm (buzzer, sound) and deduplicates on/off commands.

mod manager;
mod sink;

pub use manager::{AlertManager, AlertState};
pub use sink::{AlertSink, BuzzerCommand, LogSink, WriterSink};

use thiserror::Error;

/// Alert output errors
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Alert device write failed: {0}")]
    Io(#[from] std::io::Error),
}
