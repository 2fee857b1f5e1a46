//! DMS configuration

use serde::{Deserialize, Serialize};

use crate::DmsError;

/// DMS configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DmsConfig {
    /// Average EAR below which the eyes count as closed
    pub ear_threshold: f32,

    /// Consecutive closed-eye frames required to raise the drowsiness alarm
    pub closed_frame_threshold: u32,
}

impl Default for DmsConfig {
    fn default() -> Self {
        Self {
            ear_threshold: 0.2,
            closed_frame_threshold: 15,
        }
    }
}

impl DmsConfig {
    /// Create strict config (alarm after fewer closed frames)
    pub fn strict() -> Self {
        Self {
            ear_threshold: 0.22,
            closed_frame_threshold: 10,
        }
    }

    /// Create lenient config (more closed frames before alarm)
    pub fn lenient() -> Self {
        Self {
            ear_threshold: 0.18,
            closed_frame_threshold: 25,
        }
    }

    /// Reject values the state machine cannot work with
    pub fn validate(&self) -> Result<(), DmsError> {
        if !self.ear_threshold.is_finite() || self.ear_threshold <= 0.0 {
            return Err(DmsError::Config(format!(
                "ear_threshold must be a positive number, got {}",
                self.ear_threshold
            )));
        }
        if self.closed_frame_threshold == 0 {
            return Err(DmsError::Config(
                "closed_frame_threshold must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DmsConfig::default();
        assert_eq!(config.ear_threshold, 0.2);
        assert_eq!(config.closed_frame_threshold, 15);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(DmsConfig::strict().validate().is_ok());
        assert!(DmsConfig::lenient().validate().is_ok());
        assert!(DmsConfig::strict().closed_frame_threshold < DmsConfig::lenient().closed_frame_threshold);
    }

    #[test]
    fn test_rejects_zero_frames() {
        let config = DmsConfig {
            closed_frame_threshold: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(DmsError::Config(_))));
    }

    #[test]
    fn test_rejects_bad_threshold() {
        let config = DmsConfig {
            ear_threshold: f32::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
