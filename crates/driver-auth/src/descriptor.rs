//! Face descriptors

use serde::{Deserialize, Serialize};

use crate::AuthError;

/// Values per face descriptor
pub const DESCRIPTOR_LEN: usize = 128;

/// Face identity embedding (128 finite values), immutable once built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct Descriptor {
    values: Box<[f32]>,
}

impl Descriptor {
    pub fn new(values: Vec<f32>) -> Result<Self, AuthError> {
        if values.len() != DESCRIPTOR_LEN {
            return Err(AuthError::InvalidDescriptor {
                expected: DESCRIPTOR_LEN,
                actual: values.len(),
            });
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(AuthError::NonFiniteDescriptor { index });
        }
        Ok(Self {
            values: values.into_boxed_slice(),
        })
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Euclidean distance to another descriptor
    pub fn distance(&self, other: &Descriptor) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f32>()
            .sqrt()
    }
}

impl TryFrom<Vec<f32>> for Descriptor {
    type Error = AuthError;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<Descriptor> for Vec<f32> {
    fn from(descriptor: Descriptor) -> Self {
        descriptor.values.into_vec()
    }
}
