//! Vision backend contract
//!
//! Face detection, landmark extraction and descriptor extraction live
//! outside this crate. Per tick the backend reports either no face or a
//! [`FaceObservation`] with eye landmarks. Descriptor extraction is handed
//! out separately as a [`DescriptorRequest`] that runs off the tick path.

use std::collections::VecDeque;

use dms::{average_ear, EyeLandmarks, FaceBbox};
use driver_auth::Descriptor;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

/// Vision backend failures for a single tick
#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Vision backend failed: {0}")]
    Backend(String),

    #[error("Frame unavailable: {0}")]
    Frame(String),
}

/// Face found in the current frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceObservation {
    pub bbox: FaceBbox,
    pub left_eye: EyeLandmarks,
    pub right_eye: EyeLandmarks,
}

impl FaceObservation {
    pub fn average_ear(&self) -> f32 {
        average_ear(&self.left_eye, &self.right_eye)
    }
}

/// Deferred descriptor extraction for one face. `Ok(None)` means the face
/// could not be encoded.
pub type DescriptorRequest = Box<dyn FnOnce() -> Result<Option<Descriptor>, VisionError> + Send>;

/// Per-frame face source
pub trait VisionBackend: Send {
    /// Detect the face and its eye landmarks in the current frame
    fn observe(&mut self) -> Result<Option<FaceObservation>, VisionError>;

    /// Capture what is needed to extract the descriptor of the face seen by
    /// the last [`observe`](VisionBackend::observe). Must be cheap; the
    /// returned request does the expensive work on the blocking pool.
    fn descriptor_request(&mut self) -> DescriptorRequest;
}

/// One frame of a recorded or synthetic stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScriptedFrame {
    NoFace,
    Face {
        bbox: FaceBbox,
        left_eye: EyeLandmarks,
        right_eye: EyeLandmarks,
        /// What the encoder would produce for this face
        #[serde(default, skip_serializing_if = "Option::is_none")]
        descriptor: Option<Descriptor>,
    },
    Fault {
        message: String,
    },
}

/// Plays back a fixed sequence of frames, then reports no face
#[derive(Debug)]
pub struct ScriptedBackend {
    frames: VecDeque<ScriptedFrame>,
    current: Option<Descriptor>,
    descriptor_requests: usize,
    consumed: watch::Sender<usize>,
}

impl ScriptedBackend {
    pub fn new(frames: impl IntoIterator<Item = ScriptedFrame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            current: None,
            descriptor_requests: 0,
            consumed: watch::channel(0).0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }

    /// Number of descriptor extractions handed out
    pub fn descriptor_requests(&self) -> usize {
        self.descriptor_requests
    }

    /// Count of scripted frames played so far. The sender goes away with
    /// the backend, so waiters see an error once the runner has stopped.
    pub fn progress(&self) -> watch::Receiver<usize> {
        self.consumed.subscribe()
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl VisionBackend for ScriptedBackend {
    fn observe(&mut self) -> Result<Option<FaceObservation>, VisionError> {
        let frame = self.frames.pop_front();
        if frame.is_some() {
            self.consumed.send_modify(|n| *n += 1);
        }
        self.current = None;

        match frame {
            None | Some(ScriptedFrame::NoFace) => Ok(None),
            Some(ScriptedFrame::Fault { message }) => Err(VisionError::Backend(message)),
            Some(ScriptedFrame::Face {
                bbox,
                left_eye,
                right_eye,
                descriptor,
            }) => {
                self.current = descriptor;
                Ok(Some(FaceObservation {
                    bbox,
                    left_eye,
                    right_eye,
                }))
            }
        }
    }

    fn descriptor_request(&mut self) -> DescriptorRequest {
        self.descriptor_requests += 1;
        let descriptor = self.current.clone();
        Box::new(move || Ok(descriptor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driver_auth::DESCRIPTOR_LEN;

    fn face() -> ScriptedFrame {
        ScriptedFrame::Face {
            bbox: FaceBbox::default(),
            left_eye: EyeLandmarks::default(),
            right_eye: EyeLandmarks::default(),
            descriptor: Some(Descriptor::new(vec![0.1; DESCRIPTOR_LEN]).unwrap()),
        }
    }

    #[test]
    fn test_descriptor_extracted_for_last_face() {
        let mut backend = ScriptedBackend::new(vec![face(), ScriptedFrame::NoFace]);

        assert!(backend.observe().unwrap().is_some());
        let request = backend.descriptor_request();
        assert!(backend.observe().unwrap().is_none());
        let stale = backend.descriptor_request();

        assert!(request().unwrap().is_some());
        assert!(stale().unwrap().is_none());
        assert_eq!(backend.descriptor_requests(), 2);
    }

    #[test]
    fn test_fault_and_exhaustion() {
        let mut backend = ScriptedBackend::new(vec![ScriptedFrame::Fault {
            message: "camera unplugged".into(),
        }]);
        let progress = backend.progress();

        assert!(matches!(backend.observe(), Err(VisionError::Backend(_))));
        assert_eq!(backend.remaining(), 0);
        assert!(backend.observe().unwrap().is_none());
        assert_eq!(*progress.borrow(), 1);
    }

    #[test]
    fn test_malformed_eyes_read_as_open() {
        let face = FaceObservation {
            bbox: FaceBbox::default(),
            left_eye: EyeLandmarks::default(),
            right_eye: EyeLandmarks::default(),
        };
        assert_eq!(face.average_ear(), dms::EAR_SENTINEL);
    }

    #[test]
    fn test_scripted_frame_json() {
        let frames: Vec<ScriptedFrame> = serde_json::from_str(
            r#"[
                {"kind": "no_face"},
                {"kind": "fault", "message": "timeout"},
                {"kind": "face", "bbox": {"x": 0, "y": 0, "width": 10, "height": 10},
                 "left_eye": [{"x": 0, "y": 0}], "right_eye": []}
            ]"#,
        )
        .unwrap();

        assert_eq!(frames[0], ScriptedFrame::NoFace);
        assert!(matches!(&frames[2], ScriptedFrame::Face { descriptor: None, .. }));
    }
}
