//! Alert Manager Implementation

use std::time::Instant;

use tracing::{info, warn};

use crate::sink::{AlertSink, BuzzerCommand};

/// State of the drowsiness alarm
#[derive(Debug, Clone, Default)]
pub struct AlertState {
    /// Whether the alarm is currently sounding
    pub active: bool,
    /// Last time the alarm was raised
    pub last_fired: Option<Instant>,
    /// Number of times raised
    pub fire_count: usize,
}

/// Forwards alarm on/off to a sink, dropping repeated commands.
///
/// Sink failures are logged and never propagated: a broken buzzer must not
/// stop drowsiness monitoring.
pub struct AlertManager {
    sink: Box<dyn AlertSink>,
    state: AlertState,
}

impl AlertManager {
    /// Create a new alert manager
    pub fn new(sink: Box<dyn AlertSink>) -> Self {
        Self {
            sink,
            state: AlertState::default(),
        }
    }

    /// Sound the alarm. Returns false if it was already sounding.
    pub fn raise(&mut self) -> bool {
        if self.state.active {
            return false;
        }

        self.state.active = true;
        self.state.last_fired = Some(Instant::now());
        self.state.fire_count += 1;
        info!("Alarm raised (count: {})", self.state.fire_count);
        self.send(BuzzerCommand::On);
        true
    }

    /// Silence the alarm. Returns false if it was not sounding.
    pub fn clear(&mut self) -> bool {
        if !self.state.active {
            return false;
        }

        self.state.active = false;
        info!("Alarm cleared");
        self.send(BuzzerCommand::Off);
        true
    }

    fn send(&mut self, command: BuzzerCommand) {
        if let Err(e) = self.sink.send(command) {
            warn!("Alarm command {:?} not delivered: {}", command, e);
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.active
    }

    pub fn state(&self) -> &AlertState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AlertError;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<BuzzerCommand>>>);

    impl AlertSink for Recorder {
        fn send(&mut self, command: BuzzerCommand) -> Result<(), AlertError> {
            self.0.lock().unwrap().push(command);
            Ok(())
        }
    }

    struct Broken;

    impl AlertSink for Broken {
        fn send(&mut self, _command: BuzzerCommand) -> Result<(), AlertError> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "unplugged").into())
        }
    }

    #[test]
    fn test_deduplication() {
        let recorder = Recorder::default();
        let mut manager = AlertManager::new(Box::new(recorder.clone()));

        assert!(manager.raise());
        assert!(!manager.raise());
        assert!(manager.is_active());
        assert!(manager.clear());
        assert!(!manager.clear());

        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![BuzzerCommand::On, BuzzerCommand::Off]
        );
        assert_eq!(manager.state().fire_count, 1);
        assert!(manager.state().last_fired.is_some());
    }

    #[test]
    fn test_sink_failure_is_absorbed() {
        let mut manager = AlertManager::new(Box::new(Broken));
        assert!(manager.raise());
        assert!(manager.is_active());
        assert!(manager.clear());
    }
}
