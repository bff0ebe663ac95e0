//! Hand keypoint sets and palm localisation.
//!
//! A hand is the 21-point skeleton produced by the pose estimator: the wrist followed
//! by four joints per finger, thumb first.

use serde::{Deserialize, Serialize};

use crate::error::HandError;
use crate::geometry::{CoordinateMapper, Point2D};
use crate::util::mean;

/// Keypoint indices of the 21-point hand skeleton.
pub mod landmarks {
    pub const WRIST: usize = 0;
    pub const THUMB_CMC: usize = 1;
    pub const THUMB_MCP: usize = 2;
    pub const THUMB_IP: usize = 3;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_FINGER_MCP: usize = 5;
    pub const INDEX_FINGER_PIP: usize = 6;
    pub const INDEX_FINGER_DIP: usize = 7;
    pub const INDEX_FINGER_TIP: usize = 8;
    pub const MIDDLE_FINGER_MCP: usize = 9;
    pub const MIDDLE_FINGER_PIP: usize = 10;
    pub const MIDDLE_FINGER_DIP: usize = 11;
    pub const MIDDLE_FINGER_TIP: usize = 12;
    pub const RING_FINGER_MCP: usize = 13;
    pub const RING_FINGER_PIP: usize = 14;
    pub const RING_FINGER_DIP: usize = 15;
    pub const RING_FINGER_TIP: usize = 16;
    pub const PINKY_MCP: usize = 17;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_DIP: usize = 19;
    pub const PINKY_TIP: usize = 20;
}

pub const KEYPOINT_COUNT: usize = 21;

/// Wrist plus the base joint of every finger. These barely move when the fingers
/// flex, so their mean tracks the palm rather than the fingertips.
pub const PALM_INDICES: [usize; 6] = [
    landmarks::WRIST,
    landmarks::THUMB_CMC,
    landmarks::INDEX_FINGER_MCP,
    landmarks::MIDDLE_FINGER_MCP,
    landmarks::RING_FINGER_MCP,
    landmarks::PINKY_MCP,
];

/// Mean of the palm keypoints of a raw keypoint sequence.
pub fn palm_centroid(keypoints: &[Point2D]) -> Result<Point2D, HandError> {
    if keypoints.len() < KEYPOINT_COUNT {
        return Err(HandError::KeypointCount {
            expected: KEYPOINT_COUNT,
            found: keypoints.len(),
        });
    }

    let xs: Vec<f64> = PALM_INDICES.iter().map(|&i| keypoints[i].x).collect();
    let ys: Vec<f64> = PALM_INDICES.iter().map(|&i| keypoints[i].y).collect();

    Ok(Point2D {
        x: mean(&xs).unwrap_or_default(),
        y: mean(&ys).unwrap_or_default(),
    })
}

/// One observed hand: exactly 21 keypoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point2D>", into = "Vec<Point2D>")]
pub struct Hand {
    keypoints: [Point2D; KEYPOINT_COUNT],
}

impl Hand {
    pub fn new(keypoints: [Point2D; KEYPOINT_COUNT]) -> Self {
        Self { keypoints }
    }

    pub fn keypoints(&self) -> &[Point2D; KEYPOINT_COUNT] {
        &self.keypoints
    }

    pub fn keypoint(&self, index: usize) -> Option<Point2D> {
        self.keypoints.get(index).copied()
    }

    pub fn palm_centroid(&self) -> Point2D {
        // Length is fixed by the type, so the slice check cannot fail.
        palm_centroid(&self.keypoints).unwrap_or_default()
    }

    /// Every keypoint passed through `mapper`.
    pub fn mapped(&self, mapper: &CoordinateMapper) -> Hand {
        Hand {
            keypoints: self.keypoints.map(|p| mapper.map(p)),
        }
    }
}

impl TryFrom<Vec<Point2D>> for Hand {
    type Error = HandError;

    fn try_from(points: Vec<Point2D>) -> Result<Self, Self::Error> {
        let found = points.len();
        let keypoints: [Point2D; KEYPOINT_COUNT] =
            points.try_into().map_err(|_| HandError::KeypointCount {
                expected: KEYPOINT_COUNT,
                found,
            })?;
        Ok(Hand { keypoints })
    }
}

impl From<Hand> for Vec<Point2D> {
    fn from(hand: Hand) -> Self {
        hand.keypoints.to_vec()
    }
}

/// Hands reported by one estimator call, in estimator order.
pub type HandObservation = Vec<Hand>;
