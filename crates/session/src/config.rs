//! Session configuration

use std::path::Path;

use dms::DmsConfig;
use driver_auth::DEFAULT_MATCH_THRESHOLD;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::SessionError;

/// Prefix of environment overrides, e.g. `DMS__RECOGNITION__INTERVAL_MS=500`
const ENV_PREFIX: &str = "DMS";

/// Identity recognition settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Maximum descriptor distance (exclusive) for a match
    pub threshold: f32,

    /// Minimum time between recognition attempts (milliseconds)
    pub interval_ms: u64,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MATCH_THRESHOLD,
            interval_ms: 1000,
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub dms: DmsConfig,

    pub recognition: RecognitionConfig,

    /// How long the recognized driver survives without a face (milliseconds)
    pub identity_grace_ms: u64,

    /// Frame tick period (milliseconds)
    pub tick_interval_ms: u64,

    /// Initial state of the landmark overlay
    pub show_visualization: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dms: DmsConfig::default(),
            recognition: RecognitionConfig::default(),
            identity_grace_ms: 3000,
            tick_interval_ms: 33,
            show_visualization: false,
        }
    }
}

impl SessionConfig {
    /// Load defaults, then `path` (TOML/JSON/YAML by extension) if given,
    /// then `DMS__*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, SessionError> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            info!("Loading session config from {}", path.display());
            builder = builder.add_source(::config::File::from(path));
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config: SessionConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        self.dms.validate()?;
        if !self.recognition.threshold.is_finite() || self.recognition.threshold <= 0.0 {
            return Err(SessionError::InvalidSetting(format!(
                "recognition.threshold must be a positive number, got {}",
                self.recognition.threshold
            )));
        }
        if self.tick_interval_ms == 0 {
            return Err(SessionError::InvalidSetting(
                "tick_interval_ms must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
