//! Alarm output devices

use std::io::Write;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::AlertError;

/// Command understood by the buzzer controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuzzerCommand {
    On,
    Off,
}

impl BuzzerCommand {
    /// Single-byte wire form: `'1'` on, `'0'` off
    pub fn as_byte(self) -> u8 {
        match self {
            BuzzerCommand::On => b'1',
            BuzzerCommand::Off => b'0',
        }
    }
}

/// Alarm output device
pub trait AlertSink: Send {
    fn send(&mut self, command: BuzzerCommand) -> Result<(), AlertError>;
}

/// Writes single-byte commands to a serial link or any other writer
pub struct WriterSink<W> {
    writer: W,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> AlertSink for WriterSink<W> {
    fn send(&mut self, command: BuzzerCommand) -> Result<(), AlertError> {
        self.writer.write_all(&[command.as_byte()])?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Logs commands only (no alarm device attached)
#[derive(Debug, Default)]
pub struct LogSink;

impl AlertSink for LogSink {
    fn send(&mut self, command: BuzzerCommand) -> Result<(), AlertError> {
        match command {
            BuzzerCommand::On => warn!("DROWSINESS ALERT: wake up!"),
            BuzzerCommand::Off => info!("Drowsiness alert cleared"),
        }
        Ok(())
    }
}
