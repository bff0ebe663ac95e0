//! Proximity classification of observed hands against the hidden target.

use crate::geometry::{CoordinateMapper, Point2D};
use crate::hand::Hand;

pub const DEFAULT_HITBOX_SIZE: f64 = 100.0;

/// Axis-aligned square centered on the target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hitbox {
    pub center: Point2D,
    pub size: f64,
}

impl Hitbox {
    pub fn new(center: Point2D, size: f64) -> Self {
        Self { center, size }
    }

    pub fn half_extent(&self) -> f64 {
        self.size / 2.0
    }

    /// Closed containment, edges included.
    pub fn contains(&self, p: Point2D) -> bool {
        let h = self.half_extent();
        p.x >= self.center.x - h
            && p.x <= self.center.x + h
            && p.y >= self.center.y - h
            && p.y <= self.center.y + h
    }

    /// Strictly inside the square, edges excluded.
    pub fn strictly_contains(&self, p: Point2D) -> bool {
        let h = self.half_extent();
        (p.x - self.center.x).abs() < h && (p.y - self.center.y).abs() < h
    }

    /// (left, top, right, bottom)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let h = self.half_extent();
        (
            self.center.x - h,
            self.center.y - h,
            self.center.x + h,
            self.center.y + h,
        )
    }
}

/// A hand in screen space together with its palm centroid.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedHand {
    pub keypoints: Hand,
    pub centroid: Point2D,
}

impl MappedHand {
    pub fn from_camera(hand: &Hand, mapper: &CoordinateMapper) -> Self {
        let keypoints = hand.mapped(mapper);
        let centroid = keypoints.palm_centroid();
        Self {
            keypoints,
            centroid,
        }
    }

    /// For hands already in screen space.
    pub fn from_screen(keypoints: Hand) -> Self {
        let centroid = keypoints.palm_centroid();
        Self {
            keypoints,
            centroid,
        }
    }
}

/// Result for one hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HandProximity {
    pub is_near: bool,
    pub is_hit: bool,
}

/// Session-level result of one detection cycle with at least one hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Classification {
    Searching,
    Near,
    Hit,
}

impl Classification {
    /// `Hit` wins over `Near`, `Near` over `Searching`.
    pub fn from_proximity(p: HandProximity) -> Self {
        match (p.is_hit, p.is_near) {
            (true, _) => Classification::Hit,
            (false, true) => Classification::Near,
            (false, false) => Classification::Searching,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitClassifier {
    hitbox_size: f64,
    max_hands: usize,
}

impl Default for HitClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_HITBOX_SIZE, 2)
    }
}

impl HitClassifier {
    /// `max_hands` of 1 gives the single-hand game; extra hands are ignored in
    /// estimator order.
    pub fn new(hitbox_size: f64, max_hands: usize) -> Self {
        Self {
            hitbox_size,
            max_hands: max_hands.max(1),
        }
    }

    pub fn hitbox(&self, target: Point2D) -> Hitbox {
        Hitbox::new(target, self.hitbox_size)
    }

    pub fn max_hands(&self) -> usize {
        self.max_hands
    }

    pub fn hand_proximity(&self, hand: &MappedHand, target: Point2D) -> HandProximity {
        let hitbox = self.hitbox(target);
        HandProximity {
            is_near: hand.keypoints.keypoints().iter().any(|&k| hitbox.contains(k)),
            is_hit: hitbox.strictly_contains(hand.centroid),
        }
    }

    /// OR over the considered hands. `None` when no hand was observed, which is
    /// not the same thing as a hand far away.
    pub fn classify(&self, hands: &[MappedHand], target: Point2D) -> Option<Classification> {
        if hands.is_empty() {
            return None;
        }

        let combined = hands
            .iter()
            .take(self.max_hands)
            .map(|hand| self.hand_proximity(hand, target))
            .fold(HandProximity::default(), |acc, p| HandProximity {
                is_near: acc.is_near || p.is_near,
                is_hit: acc.is_hit || p.is_hit,
            });

        Some(Classification::from_proximity(combined))
    }
}
