//! Driver Authentication Module
//!
//! Face descriptor based driver identification:
//! - Driver enrollment from photos
//! - Copy-on-write registry of enrolled profiles
//! - Nearest-neighbour matching under a distance threshold

mod descriptor;
mod enrollment;
mod matcher;
mod profile;

pub use descriptor::{Descriptor, DESCRIPTOR_LEN};
pub use enrollment::{Enroller, FaceEncoder, MIN_ENROLLMENT_PHOTOS};
pub use matcher::{best_match, Match, DEFAULT_MATCH_THRESHOLD};
pub use profile::{ProfileRegistry, ProfileSet, UserProfile};

use thiserror::Error;
use uuid::Uuid;

/// Authentication error types
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Descriptor must have {expected} values, got {actual}")]
    InvalidDescriptor { expected: usize, actual: usize },

    #[error("Descriptor value at index {index} is not finite")]
    NonFiniteDescriptor { index: usize },

    #[error("Enrollment needs at least {required} photos, got {supplied}")]
    TooFewPhotos { required: usize, supplied: usize },

    #[error("No face detected in any enrollment photo")]
    NoUsableDescriptors,

    #[error("Driver {0} is already enrolled")]
    AlreadyEnrolled(Uuid),

    #[error("Driver {0} not enrolled")]
    NotEnrolled(Uuid),

    #[error("Embedding extraction failed: {0}")]
    EmbeddingFailed(String),
}
