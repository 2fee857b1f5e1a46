//! Snapshots and events published to observers

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Driver currently recognized in the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedUser {
    pub id: Uuid,
    pub name: String,
    /// Descriptor distance of the match that established the identity
    pub distance: f32,
}

/// Discrete state changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    DrowsinessStarted { alert_count: u32 },
    DrowsinessEnded,
    /// `user` is `None` when the driver is no longer recognized
    IdentityChanged { user: Option<RecognizedUser> },
}

/// Full session state, published every tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub is_active: bool,
    pub is_drowsy: bool,
    pub eye_aspect_ratio: f32,
    pub recognized_user_id: Option<Uuid>,
    pub alert_count: u32,
    pub consecutive_closed_frames: u32,
    pub show_visualization: bool,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            is_active: false,
            is_drowsy: false,
            eye_aspect_ratio: dms::EAR_SENTINEL,
            recognized_user_id: None,
            alert_count: 0,
            consecutive_closed_frames: 0,
            show_visualization: false,
        }
    }
}
