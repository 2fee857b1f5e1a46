//! Nearest-neighbour identity matching

use tracing::debug;

use crate::descriptor::Descriptor;
use crate::profile::{ProfileSet, UserProfile};

/// Maximum descriptor distance (exclusive) accepted as the same person
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.6;

/// Best matching profile and its distance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match<'a> {
    pub profile: &'a UserProfile,
    pub distance: f32,
}

/// Find the enrolled profile closest to `descriptor`.
///
/// Every stored descriptor of every profile is compared. The overall
/// minimum wins if it is strictly below `threshold`. Equal distances keep
/// the first candidate in enrollment order, then descriptor order.
pub fn best_match<'a>(
    descriptor: &Descriptor,
    profiles: &'a ProfileSet,
    threshold: f32,
) -> Option<Match<'a>> {
    if profiles.is_empty() {
        return None;
    }

    let mut best: Option<Match<'a>> = None;
    for profile in profiles.iter() {
        for enrolled in profile.descriptors() {
            let distance = enrolled.distance(descriptor);
            if distance.is_nan() {
                continue;
            }
            if best.map_or(true, |b| distance < b.distance) {
                best = Some(Match { profile, distance });
            }
        }
    }

    match best {
        Some(m) if m.distance < threshold => {
            debug!(driver = %m.profile.id(), distance = m.distance, "Face matched");
            Some(m)
        }
        Some(m) => {
            debug!(distance = m.distance, threshold, "No profile within threshold");
            None
        }
        None => None,
    }
}
