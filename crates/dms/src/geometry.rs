//! Eye geometry
//!
//! Eye aspect ratio (EAR) from the six landmarks of one eye:
//! points 0 and 3 are the horizontal corners, 1/5 and 2/4 are the
//! upper/lower lid pairs.
//!
//! ```text
//!        p1   p2
//!   p0             p3
//!        p5   p4
//! ```

use serde::{Deserialize, Serialize};

/// Landmarks per eye
pub const EYE_LANDMARK_COUNT: usize = 6;

/// Returned when the geometry cannot produce a ratio (treated as eyes open)
pub const EAR_SENTINEL: f32 = 1.0;

/// Eye widths below this are considered collapsed
const MIN_EYE_WIDTH: f32 = 1e-3;

/// Index ranges of each eye in the 68-point face landmark layout
const LEFT_EYE_68: std::ops::Range<usize> = 36..42;
const RIGHT_EYE_68: std::ops::Range<usize> = 42..48;

/// 2D image point
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl From<(f32, f32)> for Point {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

/// Face bounding box
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceBbox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Landmarks of one eye, as delivered by the vision backend.
///
/// The backend is expected to deliver exactly six points but this is not
/// enforced: malformed sets degrade to [`EAR_SENTINEL`] in
/// [`EyeLandmarks::aspect_ratio`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EyeLandmarks {
    points: Vec<Point>,
}

impl EyeLandmarks {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Split a 68-point face landmark set into (left, right) eyes.
    ///
    /// Returns `None` if the set is too short to contain both eyes.
    pub fn from_face_68(landmarks: &[Point]) -> Option<(Self, Self)> {
        let left = landmarks.get(LEFT_EYE_68)?;
        let right = landmarks.get(RIGHT_EYE_68)?;
        Some((Self::new(left.to_vec()), Self::new(right.to_vec())))
    }

    pub fn aspect_ratio(&self) -> f32 {
        eye_aspect_ratio(&self.points)
    }
}

impl From<Vec<Point>> for EyeLandmarks {
    fn from(points: Vec<Point>) -> Self {
        Self::new(points)
    }
}

/// Compute the eye aspect ratio `(|p1-p5| + |p2-p4|) / (2 |p0-p3|)`.
///
/// Anything but exactly six points, or a near-zero eye width, yields
/// [`EAR_SENTINEL`].
pub fn eye_aspect_ratio(eye: &[Point]) -> f32 {
    if eye.len() != EYE_LANDMARK_COUNT {
        return EAR_SENTINEL;
    }

    let a = eye[1].distance(&eye[5]);
    let b = eye[2].distance(&eye[4]);
    let c = eye[0].distance(&eye[3]);

    if c.is_nan() || c < MIN_EYE_WIDTH {
        return EAR_SENTINEL;
    }

    (a + b) / (2.0 * c)
}

/// Mean EAR over both eyes
pub fn average_ear(left: &EyeLandmarks, right: &EyeLandmarks) -> f32 {
    (left.aspect_ratio() + right.aspect_ratio()) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Eye of the given width whose lids are `opening` apart
    fn eye(width: f32, opening: f32) -> EyeLandmarks {
        let h = opening / 2.0;
        EyeLandmarks::new(vec![
            Point::new(0.0, 0.0),
            Point::new(width / 3.0, -h),
            Point::new(2.0 * width / 3.0, -h),
            Point::new(width, 0.0),
            Point::new(2.0 * width / 3.0, h),
            Point::new(width / 3.0, h),
        ])
    }

    #[test]
    fn test_open_eye_ratio() {
        // A = B = 3, C = 10 -> 6 / 20
        let ear = eye(10.0, 3.0).aspect_ratio();
        assert!((ear - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_closed_eye_ratio() {
        assert_eq!(eye(10.0, 0.0).aspect_ratio(), 0.0);
    }

    #[test]
    fn test_zero_width_returns_sentinel() {
        let collapsed = EyeLandmarks::new(vec![Point::new(5.0, 5.0); 6]);
        assert_eq!(collapsed.aspect_ratio(), EAR_SENTINEL);
        assert_eq!(eye(0.0005, 3.0).aspect_ratio(), EAR_SENTINEL);
    }

    #[test]
    fn test_nan_width_returns_sentinel() {
        let mut points = eye(10.0, 3.0).points().to_vec();
        points[3] = Point::new(f32::NAN, 0.0);
        assert_eq!(eye_aspect_ratio(&points), EAR_SENTINEL);
    }

    #[test]
    fn test_seventh_point_is_malformed() {
        let mut points = eye(10.0, 3.0).points().to_vec();
        points.push(Point::new(15.0, 0.0));
        assert_eq!(eye_aspect_ratio(&points), EAR_SENTINEL);
    }

    #[test]
    fn test_average() {
        let left = eye(10.0, 3.0);
        let right = eye(10.0, 1.0);
        assert!((average_ear(&left, &right) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_average_with_one_malformed_eye() {
        let left = EyeLandmarks::new(vec![Point::new(0.0, 0.0)]);
        let right = eye(10.0, 0.0);
        assert!((average_ear(&left, &right) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_from_face_68() {
        let landmarks: Vec<Point> = (0..68).map(|i| Point::new(i as f32, 0.0)).collect();
        let (left, right) = EyeLandmarks::from_face_68(&landmarks).unwrap();
        assert_eq!(left.points().len(), 6);
        assert_eq!(left.points()[0].x, 36.0);
        assert_eq!(right.points()[5].x, 47.0);

        assert!(EyeLandmarks::from_face_68(&landmarks[..40]).is_none());
    }

    proptest! {
        #[test]
        fn prop_wrong_sized_landmark_sets_return_sentinel(
            coords in proptest::collection::vec((-1000.0f32..1000.0, -1000.0f32..1000.0), 0..6),
            extra in proptest::collection::vec((-1000.0f32..1000.0, -1000.0f32..1000.0), 7..20),
        ) {
            let too_many: Vec<Point> = extra.into_iter().map(Point::from).collect();
            prop_assert_eq!(eye_aspect_ratio(&too_many), EAR_SENTINEL);

            let points: Vec<Point> = coords.into_iter().map(Point::from).collect();
            prop_assert_eq!(eye_aspect_ratio(&points), EAR_SENTINEL);
        }

        #[test]
        fn prop_ratio_is_non_negative(
            width in 0.01f32..500.0,
            opening in 0.0f32..500.0,
        ) {
            let ear = eye(width, opening).aspect_ratio();
            prop_assert!(ear >= 0.0);
            prop_assert!(ear.is_finite());
        }
    }
}
