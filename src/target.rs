use rand::Rng;
use tracing::{debug, warn};

use crate::geometry::{Point2D, Viewport};
use crate::util::clamp_or_center;

pub const DEFAULT_MARGIN: f64 = 100.0;

/// Places the hidden target so that a hitbox around it stays on screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetPointGenerator {
    margin: f64,
}

impl Default for TargetPointGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_MARGIN)
    }
}

impl TargetPointGenerator {
    pub fn new(margin: f64) -> Self {
        Self {
            margin: margin.max(0.0),
        }
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }

    /// Draws a target uniformly from `[margin, extent - margin]` on each axis.
    ///
    /// An axis narrower than twice the margin has no valid range; the target is put
    /// on that axis' center line instead.
    pub fn generate<R: Rng>(&self, viewport: Viewport, rng: &mut R) -> Point2D {
        let target = Point2D {
            x: self.axis(viewport.width, rng),
            y: self.axis(viewport.height, rng),
        };
        debug!(x = target.x, y = target.y, "generated target");
        target
    }

    /// Pulls `p` into the range [`generate`](Self::generate) draws from.
    pub fn clamp(&self, viewport: Viewport, p: Point2D) -> Point2D {
        Point2D {
            x: clamp_or_center(p.x, self.margin, viewport.width - self.margin),
            y: clamp_or_center(p.y, self.margin, viewport.height - self.margin),
        }
    }

    fn axis<R: Rng>(&self, extent: f64, rng: &mut R) -> f64 {
        let low = self.margin;
        let high = extent - self.margin;
        if low > high {
            warn!(
                extent,
                margin = self.margin,
                "viewport too small for target margin, centering"
            );
            return clamp_or_center(extent / 2.0, low, high);
        }
        rng.gen_range(low..=high)
    }
}
