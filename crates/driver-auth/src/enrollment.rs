//! Driver enrollment from photos

use image::RgbImage;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::descriptor::Descriptor;
use crate::profile::UserProfile;
use crate::AuthError;

/// Photos required to start an enrollment
pub const MIN_ENROLLMENT_PHOTOS: usize = 3;

/// Enrollment primitive of the vision backend
pub trait FaceEncoder {
    /// Descriptor of the best single face in `image`, or `None` if no face
    /// was detected.
    fn encode(&self, image: &RgbImage) -> Result<Option<Descriptor>, AuthError>;
}

/// Builds profiles from enrollment photos
pub struct Enroller<E> {
    encoder: E,
    min_photos: usize,
}

impl<E: FaceEncoder> Enroller<E> {
    pub fn new(encoder: E) -> Self {
        Self {
            encoder,
            min_photos: MIN_ENROLLMENT_PHOTOS,
        }
    }

    /// Override the minimum photo count (at least one)
    pub fn with_min_photos(mut self, min_photos: usize) -> Self {
        self.min_photos = min_photos.max(1);
        self
    }

    /// Enroll a driver.
    ///
    /// Photos without a detectable face, or that the encoder fails on, are
    /// skipped. Fails if none of the photos yields a descriptor.
    pub fn enroll(
        &self,
        id: Uuid,
        name: &str,
        photos: &[RgbImage],
    ) -> Result<UserProfile, AuthError> {
        if photos.len() < self.min_photos {
            return Err(AuthError::TooFewPhotos {
                required: self.min_photos,
                supplied: photos.len(),
            });
        }

        let mut descriptors = Vec::with_capacity(photos.len());
        for (index, photo) in photos.iter().enumerate() {
            match self.encoder.encode(photo) {
                Ok(Some(descriptor)) => descriptors.push(descriptor),
                Ok(None) => debug!(index, "No face in enrollment photo"),
                Err(e) => warn!(index, "Enrollment photo skipped: {}", e),
            }
        }

        if descriptors.is_empty() {
            warn!("Enrollment failed for {}: no usable photos", name);
            return Err(AuthError::NoUsableDescriptors);
        }

        info!(
            "Enrollment for {} used {}/{} photos",
            name,
            descriptors.len(),
            photos.len()
        );
        UserProfile::new(id, name, descriptors)
    }
}
