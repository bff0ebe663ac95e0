//! Stand-ins for the camera and the pose model: a keyboard-driven synthetic hand
//! for the terminal game, and recorded keypoint streams for replays.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::detection::{FrameProvider, PoseEstimator, VideoFrame};
use crate::error::{EstimatorError, RecordingError};
use crate::geometry::{CoordinateMapper, FrameSize, Point2D, Viewport};
use crate::hand::{Hand, HandObservation, KEYPOINT_COUNT};
use crate::util::clamp_or_center;

/// Open right hand, palm toward the camera, in units of the palm scale. The six
/// palm joints average to the origin.
const HAND_SHAPE: [(f64, f64); KEYPOINT_COUNT] = [
    (0.0, 1.8),
    (-0.9, 0.6),
    (-1.4, 0.2),
    (-1.8, -0.2),
    (-2.1, -0.6),
    (-0.6, -0.6),
    (-0.7, -1.4),
    (-0.75, -1.9),
    (-0.8, -2.3),
    (-0.1, -0.8),
    (-0.1, -1.7),
    (-0.1, -2.2),
    (-0.1, -2.7),
    (0.5, -0.7),
    (0.6, -1.5),
    (0.65, -2.0),
    (0.7, -2.4),
    (1.1, -0.3),
    (1.3, -0.9),
    (1.45, -1.3),
    (1.6, -1.7),
];

pub const DEFAULT_PALM_SCALE: f64 = 25.0;

/// A screen-space hand whose palm centroid is exactly `palm`.
pub fn synthetic_hand(palm: Point2D, scale: f64) -> Hand {
    Hand::new(HAND_SHAPE.map(|(dx, dy)| Point2D::new(palm.x + dx * scale, palm.y + dy * scale)))
}

/// Camera that reports nothing for `warmup` frames, then frames of a fixed size.
#[derive(Debug, Clone)]
pub struct SyntheticCamera {
    size: FrameSize,
    warmup: u64,
    sequence: u64,
}

impl SyntheticCamera {
    pub fn new(size: FrameSize, warmup: u64) -> Self {
        Self {
            size,
            warmup,
            sequence: 0,
        }
    }
}

impl FrameProvider for SyntheticCamera {
    fn next_frame(&mut self) -> Option<VideoFrame> {
        self.sequence += 1;
        if self.sequence <= self.warmup {
            return None;
        }
        Some(VideoFrame {
            size: self.size,
            sequence: self.sequence,
            pixels: Vec::new(),
        })
    }
}

pub const PUPPET_HANDS: usize = 2;

#[derive(Debug, Clone)]
struct PuppetState {
    palms: [Option<Point2D>; PUPPET_HANDS],
    active: usize,
    scale: f64,
    viewport: Viewport,
}

/// Shared, keyboard-controlled hand positions in screen space.
#[derive(Debug, Clone)]
pub struct Puppet {
    state: Arc<Mutex<PuppetState>>,
}

impl Puppet {
    /// One visible hand in the lower middle of the screen.
    pub fn new(viewport: Viewport) -> Self {
        let start = Point2D::new(viewport.width / 2.0, viewport.height * 0.8);
        Self {
            state: Arc::new(Mutex::new(PuppetState {
                palms: [Some(start), None],
                active: 0,
                scale: DEFAULT_PALM_SCALE,
                viewport,
            })),
        }
    }

    pub fn move_active(&self, dx: f64, dy: f64) {
        let mut s = self.state.lock();
        let vp = s.viewport;
        let active = s.active;
        if let Some(p) = s.palms[active].as_mut() {
            p.x = clamp_or_center(p.x + dx, 0.0, vp.width);
            p.y = clamp_or_center(p.y + dy, 0.0, vp.height);
        }
    }

    /// Hides the active hand, or shows it again at the screen center.
    pub fn toggle_active(&self) {
        let mut s = self.state.lock();
        let active = s.active;
        let center = s.viewport.center();
        s.palms[active] = match s.palms[active] {
            Some(_) => None,
            None => Some(center),
        };
    }

    /// Switches keyboard control to the other hand, showing it if hidden.
    pub fn switch_active(&self) {
        let mut s = self.state.lock();
        s.active = (s.active + 1) % PUPPET_HANDS;
        let active = s.active;
        if s.palms[active].is_none() {
            s.palms[active] = Some(s.viewport.center());
        }
    }

    pub fn active(&self) -> usize {
        self.state.lock().active
    }

    /// Visible hands in screen space, in hand order.
    pub fn hands(&self) -> Vec<Hand> {
        let s = self.state.lock();
        s.palms
            .iter()
            .flatten()
            .map(|&palm| synthetic_hand(palm, s.scale))
            .collect()
    }

    pub fn palms(&self) -> Vec<Point2D> {
        self.state.lock().palms.iter().flatten().copied().collect()
    }
}

/// Reports the puppet's hands as a camera would see them.
#[derive(Debug, Clone)]
pub struct PuppetEstimator {
    puppet: Puppet,
    viewport: Viewport,
}

impl PuppetEstimator {
    pub fn new(puppet: Puppet, viewport: Viewport) -> Self {
        Self { puppet, viewport }
    }
}

impl PoseEstimator for PuppetEstimator {
    fn estimate_hands(&mut self, frame: &VideoFrame) -> Result<HandObservation, EstimatorError> {
        let mapper = CoordinateMapper::new(frame.size, self.viewport)
            .ok_or_else(|| EstimatorError::Failed("frame has no size".into()))?;
        Ok(self
            .puppet
            .hands()
            .iter()
            .map(|hand| Hand::new(hand.keypoints().map(|p| mapper.unmap(p))))
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordedFrame {
    NotReady,
    Hands(Vec<Hand>),
    Error(String),
}

fn default_fps() -> f64 {
    30.0
}

/// A captured keypoint stream, in camera pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub frame_size: FrameSize,
    #[serde(default = "default_fps")]
    pub fps: f64,
    #[serde(default)]
    pub target: Option<Point2D>,
    pub frames: Vec<RecordedFrame>,
}

impl Recording {
    pub fn from_json(json: &str) -> Result<Self, RecordingError> {
        let recording: Recording = serde_json::from_str(json)?;
        if !(recording.fps > 0.0) {
            return Err(RecordingError::InvalidFps(recording.fps));
        }
        Ok(recording)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RecordingError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Camera and estimator that play the frames back in order.
    pub fn feed(&self) -> (ReplayCamera, ReplayEstimator) {
        let frames = Arc::new(self.frames.clone());
        (
            ReplayCamera {
                frames: Arc::clone(&frames),
                size: self.frame_size,
                next: 0,
            },
            ReplayEstimator { frames },
        )
    }
}

#[derive(Debug, Clone)]
pub struct ReplayCamera {
    frames: Arc<Vec<RecordedFrame>>,
    size: FrameSize,
    next: u64,
}

impl FrameProvider for ReplayCamera {
    fn next_frame(&mut self) -> Option<VideoFrame> {
        let sequence = self.next;
        let frame = self.frames.get(sequence as usize)?;
        self.next += 1;
        let size = match frame {
            RecordedFrame::NotReady => FrameSize::default(),
            RecordedFrame::Hands(_) | RecordedFrame::Error(_) => self.size,
        };
        Some(VideoFrame {
            size,
            sequence,
            pixels: Vec::new(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ReplayEstimator {
    frames: Arc<Vec<RecordedFrame>>,
}

impl PoseEstimator for ReplayEstimator {
    fn estimate_hands(&mut self, frame: &VideoFrame) -> Result<HandObservation, EstimatorError> {
        match self.frames.get(frame.sequence as usize) {
            Some(RecordedFrame::Hands(hands)) => Ok(hands.clone()),
            Some(RecordedFrame::Error(msg)) => Err(EstimatorError::Failed(msg.clone())),
            Some(RecordedFrame::NotReady) | None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{DetectionLoop, DetectionOutcome};
    use crate::hand::landmarks;

    #[test]
    fn test_synthetic_hand_centroid_is_palm() {
        let palm = Point2D::new(321.0, 123.0);
        let c = synthetic_hand(palm, 25.0).palm_centroid();
        assert!((c.x - palm.x).abs() < 1e-9);
        assert!((c.y - palm.y).abs() < 1e-9);
    }

    #[test]
    fn test_synthetic_fingers_point_up() {
        let hand = synthetic_hand(Point2D::new(400.0, 300.0), 25.0);
        let tip = hand.keypoint(landmarks::MIDDLE_FINGER_TIP).unwrap();
        let wrist = hand.keypoint(landmarks::WRIST).unwrap();
        assert!(tip.y < 300.0);
        assert!(wrist.y > 300.0);
    }

    #[test]
    fn test_camera_warms_up() {
        let mut cam = SyntheticCamera::new(FrameSize::new(640, 480), 2);
        assert!(cam.next_frame().is_none());
        assert!(cam.next_frame().is_none());
        let frame = cam.next_frame().unwrap();
        assert_eq!(frame.size, FrameSize::new(640, 480));
    }

    #[test]
    fn test_puppet_moves_and_clamps() {
        let puppet = Puppet::new(Viewport::new(800.0, 600.0));
        assert_eq!(puppet.palms(), vec![Point2D::new(400.0, 480.0)]);
        puppet.move_active(-50.0, 0.0);
        assert_eq!(puppet.palms(), vec![Point2D::new(350.0, 480.0)]);
        puppet.move_active(0.0, 1000.0);
        assert_eq!(puppet.palms(), vec![Point2D::new(350.0, 600.0)]);
    }

    #[test]
    fn test_puppet_toggle_and_switch() {
        let puppet = Puppet::new(Viewport::new(800.0, 600.0));
        puppet.toggle_active();
        assert!(puppet.hands().is_empty());
        puppet.toggle_active();
        assert_eq!(puppet.palms(), vec![Point2D::new(400.0, 300.0)]);

        puppet.switch_active();
        assert_eq!(puppet.active(), 1);
        assert_eq!(puppet.hands().len(), 2);
        puppet.move_active(10.0, 0.0);
        assert_eq!(puppet.palms()[1], Point2D::new(410.0, 300.0));
    }

    #[test]
    fn test_puppet_estimator_round_trips_through_mapper() {
        let viewport = Viewport::new(800.0, 600.0);
        let puppet = Puppet::new(viewport);
        let mut est = PuppetEstimator::new(puppet.clone(), viewport);
        let frame = VideoFrame {
            size: FrameSize::new(640, 480),
            sequence: 1,
            pixels: Vec::new(),
        };
        let hands = est.estimate_hands(&frame).unwrap();
        let mapper = CoordinateMapper::new(frame.size, viewport).unwrap();
        let c = hands[0].mapped(&mapper).palm_centroid();
        let palm = puppet.palms()[0];
        assert!((c.x - palm.x).abs() < 1e-9);
        assert!((c.y - palm.y).abs() < 1e-9);
    }

    #[test]
    fn test_recording_parses_all_frame_kinds() {
        let points = serde_json::to_string(&vec![Point2D::new(1.0, 1.0); KEYPOINT_COUNT]).unwrap();
        let json = format!(
            r#"{{
                "frame_size": {{ "width": 640, "height": 480 }},
                "frames": ["not_ready", {{ "hands": [{points}] }}, {{ "error": "lost tracking" }}]
            }}"#
        );
        let rec = Recording::from_json(&json).unwrap();
        assert_eq!(rec.fps, 30.0);
        assert_eq!(rec.target, None);
        assert_eq!(rec.frames.len(), 3);

        let (cam, est) = rec.feed();
        let mut dl = DetectionLoop::new(cam, est);
        assert_eq!(dl.detect(), DetectionOutcome::NotReady);
        assert!(matches!(dl.detect(), DetectionOutcome::Observed { ref hands, .. } if hands.len() == 1));
        assert_eq!(
            dl.detect(),
            DetectionOutcome::Failed(EstimatorError::Failed("lost tracking".into()))
        );
        assert_eq!(dl.detect(), DetectionOutcome::NotReady);
    }

    #[test]
    fn test_recording_rejects_bad_fps_and_short_hands() {
        let bad_fps = r#"{ "frame_size": { "width": 1, "height": 1 }, "fps": 0, "frames": [] }"#;
        assert!(matches!(
            Recording::from_json(bad_fps),
            Err(RecordingError::InvalidFps(_))
        ));

        let short = r#"{ "frame_size": { "width": 1, "height": 1 },
                         "frames": [{ "hands": [[{ "x": 0, "y": 0 }]] }] }"#;
        assert!(matches!(
            Recording::from_json(short),
            Err(RecordingError::Parse(_))
        ));
    }
}
