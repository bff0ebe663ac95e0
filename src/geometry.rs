use serde::{Deserialize, Serialize};

/// A point in 2D space. Screen space unless the caller says otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Point2D {
    fn from(v: (f64, f64)) -> Self {
        Point2D { x: v.0, y: v.1 }
    }
}

impl From<Point2D> for (f64, f64) {
    fn from(p: Point2D) -> Self {
        (p.x, p.y)
    }
}

/// Screen dimensions, fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Point2D {
        Point2D::new(self.width / 2.0, self.height / 2.0)
    }
}

/// Pixel dimensions of the camera frame. Zero until the video metadata is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_ready(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Maps camera-space keypoints onto a horizontally mirrored screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    frame: FrameSize,
    viewport: Viewport,
}

impl CoordinateMapper {
    /// Returns `None` while the camera reports a zero dimension; the frame must be skipped.
    pub fn new(frame: FrameSize, viewport: Viewport) -> Option<Self> {
        if !frame.is_ready() {
            return None;
        }
        Some(Self { frame, viewport })
    }

    pub fn map(&self, p: Point2D) -> Point2D {
        let sw = self.viewport.width;
        let sh = self.viewport.height;
        Point2D {
            x: sw - (p.x / self.frame.width as f64) * sw,
            y: (p.y / self.frame.height as f64) * sh,
        }
    }

    /// Inverse of [`CoordinateMapper::map`]: screen space back to camera pixels.
    pub fn unmap(&self, p: Point2D) -> Point2D {
        let sw = self.viewport.width;
        let sh = self.viewport.height;
        Point2D {
            x: ((sw - p.x) / sw) * self.frame.width as f64,
            y: (p.y / sh) * self.frame.height as f64,
        }
    }

    pub fn frame(&self) -> FrameSize {
        self.frame
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }
}
