//! Drowsiness state machine
//!
//! Evaluated once per frame, in order:
//! 1. no face: counter reset, alarm dropped immediately
//! 2. EAR below threshold: counter incremented, alarm raised when it
//!    reaches `closed_frame_threshold` (once per crossing)
//! 3. eyes open: counter reset, alarm dropped

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::DmsConfig;
use crate::geometry::EAR_SENTINEL;

/// Alarm state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DrowsinessState {
    #[default]
    Awake,
    Drowsy,
}

/// Edge produced by [`DrowsinessMonitor::update`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrowsinessTransition {
    Started,
    Ended,
}

/// Per-frame output of the state machine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrowsinessReading {
    pub state: DrowsinessState,
    pub consecutive_closed_frames: u32,
    pub average_ear: f32,
}

/// Hysteresis counter plus alarm state (tracked over time)
#[derive(Debug, Clone)]
pub struct DrowsinessMonitor {
    config: DmsConfig,
    state: DrowsinessState,
    consecutive_closed_frames: u32,
    current_ear: f32,
    alert_count: u32,
}

impl DrowsinessMonitor {
    pub fn new(config: DmsConfig) -> Self {
        Self {
            config,
            state: DrowsinessState::Awake,
            consecutive_closed_frames: 0,
            current_ear: EAR_SENTINEL,
            alert_count: 0,
        }
    }

    /// Feed one frame. `average_ear` is `None` when no face was observed.
    pub fn update(&mut self, average_ear: Option<f32>) -> Option<DrowsinessTransition> {
        let Some(ear) = average_ear else {
            self.consecutive_closed_frames = 0;
            self.current_ear = EAR_SENTINEL;
            return self.wake("face lost");
        };

        self.current_ear = ear;

        if ear < self.config.ear_threshold {
            self.consecutive_closed_frames = self.consecutive_closed_frames.saturating_add(1);
            debug!(
                ear,
                frames = self.consecutive_closed_frames,
                "Eyes closed"
            );

            if self.state == DrowsinessState::Awake
                && self.consecutive_closed_frames >= self.config.closed_frame_threshold
            {
                self.state = DrowsinessState::Drowsy;
                self.alert_count += 1;
                info!(
                    frames = self.consecutive_closed_frames,
                    alert_count = self.alert_count,
                    "Drowsiness detected"
                );
                return Some(DrowsinessTransition::Started);
            }
            None
        } else {
            self.consecutive_closed_frames = 0;
            self.wake("eyes open")
        }
    }

    fn wake(&mut self, reason: &str) -> Option<DrowsinessTransition> {
        if self.state == DrowsinessState::Drowsy {
            self.state = DrowsinessState::Awake;
            info!(reason, "Drowsiness ended");
            Some(DrowsinessTransition::Ended)
        } else {
            None
        }
    }

    pub fn reading(&self) -> DrowsinessReading {
        DrowsinessReading {
            state: self.state,
            consecutive_closed_frames: self.consecutive_closed_frames,
            average_ear: self.current_ear,
        }
    }

    pub fn state(&self) -> DrowsinessState {
        self.state
    }

    pub fn is_drowsy(&self) -> bool {
        self.state == DrowsinessState::Drowsy
    }

    pub fn consecutive_closed_frames(&self) -> u32 {
        self.consecutive_closed_frames
    }

    /// Last EAR fed in, or the sentinel when no face is present
    pub fn current_ear(&self) -> f32 {
        self.current_ear
    }

    /// Number of transitions into the drowsy state
    pub fn alert_count(&self) -> u32 {
        self.alert_count
    }

    pub fn config(&self) -> &DmsConfig {
        &self.config
    }

    /// Reset state (on deactivation or driver change)
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }
}

impl Default for DrowsinessMonitor {
    fn default() -> Self {
        Self::new(DmsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(monitor: &mut DrowsinessMonitor, ear: f32, frames: usize) -> Vec<DrowsinessTransition> {
        (0..frames).filter_map(|_| monitor.update(Some(ear))).collect()
    }

    #[test]
    fn test_fourteen_closed_frames_do_not_alarm() {
        let mut monitor = DrowsinessMonitor::default();

        assert!(feed(&mut monitor, 0.1, 14).is_empty());
        assert!(!monitor.is_drowsy());
        assert_eq!(monitor.consecutive_closed_frames(), 14);

        assert_eq!(monitor.update(Some(0.3)), None);
        assert!(!monitor.is_drowsy());
        assert_eq!(monitor.consecutive_closed_frames(), 0);
        assert_eq!(monitor.alert_count(), 0);
    }

    #[test]
    fn test_alarm_on_fifteenth_frame() {
        let mut monitor = DrowsinessMonitor::default();

        for frame in 1..=15 {
            let transition = monitor.update(Some(0.1));
            if frame < 15 {
                assert_eq!(transition, None);
                assert!(!monitor.is_drowsy());
            } else {
                assert_eq!(transition, Some(DrowsinessTransition::Started));
                assert!(monitor.is_drowsy());
            }
        }
        assert_eq!(monitor.alert_count(), 1);
    }

    #[test]
    fn test_alarm_is_edge_triggered() {
        let mut monitor = DrowsinessMonitor::default();

        let transitions = feed(&mut monitor, 0.1, 40);
        assert_eq!(transitions, vec![DrowsinessTransition::Started]);
        assert_eq!(monitor.alert_count(), 1);
        assert_eq!(monitor.consecutive_closed_frames(), 40);
    }

    #[test]
    fn test_no_face_resets_immediately() {
        let mut monitor = DrowsinessMonitor::default();
        feed(&mut monitor, 0.1, 15);
        assert!(monitor.is_drowsy());

        assert_eq!(monitor.update(None), Some(DrowsinessTransition::Ended));
        assert!(!monitor.is_drowsy());
        assert_eq!(monitor.consecutive_closed_frames(), 0);
        assert_eq!(monitor.current_ear(), EAR_SENTINEL);
        assert_eq!(monitor.alert_count(), 1);
    }

    #[test]
    fn test_eyes_open_ends_alarm() {
        let mut monitor = DrowsinessMonitor::default();
        feed(&mut monitor, 0.1, 20);

        assert_eq!(monitor.update(Some(0.35)), Some(DrowsinessTransition::Ended));
        assert_eq!(monitor.update(Some(0.35)), None);
    }

    #[test]
    fn test_second_episode_counts_again() {
        let mut monitor = DrowsinessMonitor::default();
        feed(&mut monitor, 0.1, 15);
        monitor.update(Some(0.3));
        feed(&mut monitor, 0.1, 15);

        assert!(monitor.is_drowsy());
        assert_eq!(monitor.alert_count(), 2);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let mut monitor = DrowsinessMonitor::default();
        feed(&mut monitor, 0.2, 30);
        assert_eq!(monitor.consecutive_closed_frames(), 0);
        assert!(!monitor.is_drowsy());
    }

    #[test]
    fn test_no_face_while_awake_is_silent() {
        let mut monitor = DrowsinessMonitor::default();
        feed(&mut monitor, 0.1, 5);
        assert_eq!(monitor.update(None), None);
        assert_eq!(monitor.consecutive_closed_frames(), 0);
    }

    #[test]
    fn test_custom_threshold() {
        let mut monitor = DrowsinessMonitor::new(DmsConfig {
            ear_threshold: 0.25,
            closed_frame_threshold: 3,
        });
        let transitions = feed(&mut monitor, 0.22, 3);
        assert_eq!(transitions, vec![DrowsinessTransition::Started]);
    }

    #[test]
    fn test_reset_keeps_config() {
        let mut monitor = DrowsinessMonitor::new(DmsConfig::strict());
        feed(&mut monitor, 0.1, 12);
        monitor.reset();

        assert_eq!(monitor.reading(), DrowsinessReading {
            state: DrowsinessState::Awake,
            consecutive_closed_frames: 0,
            average_ear: EAR_SENTINEL,
        });
        assert_eq!(monitor.alert_count(), 0);
        assert_eq!(monitor.config(), &DmsConfig::strict());
    }
}
