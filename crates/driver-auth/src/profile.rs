//! Enrolled driver profiles

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::descriptor::Descriptor;
use crate::AuthError;

/// Enrolled driver: one descriptor per usable enrollment photo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ProfileRecord")]
pub struct UserProfile {
    id: Uuid,
    name: String,
    descriptors: Vec<Descriptor>,
    enrolled_at: DateTime<Utc>,
}

/// Unchecked wire form of [`UserProfile`]
#[derive(Deserialize)]
struct ProfileRecord {
    id: Uuid,
    name: String,
    descriptors: Vec<Descriptor>,
    enrolled_at: DateTime<Utc>,
}

impl TryFrom<ProfileRecord> for UserProfile {
    type Error = AuthError;

    fn try_from(record: ProfileRecord) -> Result<Self, Self::Error> {
        let mut profile = UserProfile::new(record.id, record.name, record.descriptors)?;
        profile.enrolled_at = record.enrolled_at;
        Ok(profile)
    }
}

impl UserProfile {
    /// Create a profile. Fails if `descriptors` is empty.
    pub fn new(
        id: Uuid,
        name: impl Into<String>,
        descriptors: Vec<Descriptor>,
    ) -> Result<Self, AuthError> {
        if descriptors.is_empty() {
            return Err(AuthError::NoUsableDescriptors);
        }
        Ok(Self {
            id,
            name: name.into(),
            descriptors,
            enrolled_at: Utc::now(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Never empty
    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    pub fn enrolled_at(&self) -> DateTime<Utc> {
        self.enrolled_at
    }
}

/// Immutable set of profiles in enrollment order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileSet {
    profiles: Vec<UserProfile>,
}

impl ProfileSet {
    pub fn new(profiles: Vec<UserProfile>) -> Self {
        Self { profiles }
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UserProfile> {
        self.profiles.iter()
    }

    pub fn get(&self, id: Uuid) -> Option<&UserProfile> {
        self.profiles.iter().find(|p| p.id == id)
    }
}

impl FromIterator<UserProfile> for ProfileSet {
    fn from_iter<I: IntoIterator<Item = UserProfile>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Registry of enrolled profiles.
///
/// Every mutation publishes a fresh [`ProfileSet`] snapshot; snapshots
/// already handed out are never modified.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    current: Arc<ProfileSet>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_set(set: ProfileSet) -> Self {
        Self {
            current: Arc::new(set),
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<ProfileSet> {
        Arc::clone(&self.current)
    }

    /// Add a profile, returning the new snapshot
    pub fn add(&mut self, profile: UserProfile) -> Result<Arc<ProfileSet>, AuthError> {
        if self.current.get(profile.id).is_some() {
            return Err(AuthError::AlreadyEnrolled(profile.id));
        }

        info!(
            "Driver enrolled: {} ({}, {} descriptors)",
            profile.name,
            profile.id,
            profile.descriptors.len()
        );

        let mut profiles = self.current.profiles.clone();
        profiles.push(profile);
        self.current = Arc::new(ProfileSet::new(profiles));
        Ok(self.snapshot())
    }

    /// Remove a profile, returning the new snapshot
    pub fn remove(&mut self, id: Uuid) -> Result<Arc<ProfileSet>, AuthError> {
        if self.current.get(id).is_none() {
            return Err(AuthError::NotEnrolled(id));
        }

        let profiles = self
            .current
            .iter()
            .filter(|p| p.id != id)
            .cloned()
            .collect();
        self.current = Arc::new(profiles);
        info!("Driver removed: {}", id);
        Ok(self.snapshot())
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }
}
