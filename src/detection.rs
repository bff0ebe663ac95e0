//! The detection cycle: grab a frame, ask the estimator for hands, report back.
//!
//! [`DetectionLoop::detect`] is a blocking `&mut self` call, so one loop can never
//! have two estimator calls in flight. [`DetectionWorker`] moves a loop onto its own
//! thread and refuses new requests until the current one has been answered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::error::EstimatorError;
use crate::geometry::FrameSize;
use crate::hand::HandObservation;
use crate::runtime::GameEvent;
use crate::session::Generation;

/// One decoded camera frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoFrame {
    pub size: FrameSize,
    /// Monotonic frame number from the provider.
    pub sequence: u64,
    pub pixels: Vec<u8>,
}

/// Camera side of the pipeline.
pub trait FrameProvider: Send + 'static {
    /// Latest frame, or `None` before the first frame has been decoded.
    fn next_frame(&mut self) -> Option<VideoFrame>;
}

/// The hand pose model. Treated as a black box that may fail or take a while.
pub trait PoseEstimator: Send + 'static {
    fn estimate_hands(&mut self, frame: &VideoFrame) -> Result<HandObservation, EstimatorError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetectionOutcome {
    /// No frame, or the frame reports a zero dimension. Nothing to classify.
    NotReady,
    Observed {
        frame: FrameSize,
        hands: HandObservation,
    },
    Failed(EstimatorError),
}

/// A detection outcome tagged with the session generation that asked for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub generation: Generation,
    pub outcome: DetectionOutcome,
}

pub struct DetectionLoop<P: FrameProvider, E: PoseEstimator> {
    provider: P,
    estimator: E,
    cycles: u64,
}

impl<P: FrameProvider, E: PoseEstimator> DetectionLoop<P, E> {
    pub fn new(provider: P, estimator: E) -> Self {
        Self {
            provider,
            estimator,
            cycles: 0,
        }
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn detect(&mut self) -> DetectionOutcome {
        match self.next_frame() {
            Some(frame) => self.estimate(&frame),
            None => DetectionOutcome::NotReady,
        }
    }

    /// Starts a cycle: the next frame, if the camera has one with a size.
    pub fn next_frame(&mut self) -> Option<VideoFrame> {
        self.cycles += 1;
        self.provider
            .next_frame()
            .filter(|frame| frame.size.is_ready())
    }

    /// Finishes a cycle by running the estimator on `frame`.
    pub fn estimate(&mut self, frame: &VideoFrame) -> DetectionOutcome {
        match self.estimator.estimate_hands(frame) {
            Ok(hands) => {
                debug!(sequence = frame.sequence, hands = hands.len(), "detected");
                DetectionOutcome::Observed {
                    frame: frame.size,
                    hands,
                }
            }
            Err(err) => {
                warn!(sequence = frame.sequence, error = %err, "hand estimation failed, continuing");
                DetectionOutcome::Failed(err)
            }
        }
    }
}

/// A [`DetectionLoop`] on a background thread. Results arrive as
/// [`GameEvent::Detection`] on the sender given at spawn time, preceded once by
/// [`GameEvent::CameraReady`] when the first usable frame shows up.
pub struct DetectionWorker {
    requests: Option<Sender<Generation>>,
    in_flight: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl DetectionWorker {
    pub fn spawn<P: FrameProvider, E: PoseEstimator>(
        mut detection_loop: DetectionLoop<P, E>,
        events: Sender<GameEvent>,
    ) -> Self {
        let (requests, request_rx) = mpsc::channel::<Generation>();
        let in_flight = Arc::new(AtomicBool::new(false));
        let worker_flag = Arc::clone(&in_flight);

        let thread = thread::spawn(move || {
            let mut camera_ready = false;
            while let Ok(generation) = request_rx.recv() {
                let outcome = match detection_loop.next_frame() {
                    Some(frame) => {
                        if !camera_ready {
                            camera_ready = true;
                            info!(sequence = frame.sequence, "camera ready");
                            if events.send(GameEvent::CameraReady).is_err() {
                                break;
                            }
                        }
                        detection_loop.estimate(&frame)
                    }
                    None => DetectionOutcome::NotReady,
                };
                worker_flag.store(false, Ordering::SeqCst);
                let detection = Detection {
                    generation,
                    outcome,
                };
                if events.send(GameEvent::Detection(detection)).is_err() {
                    break;
                }
            }
        });

        Self {
            requests: Some(requests),
            in_flight,
            thread: Some(thread),
        }
    }

    /// Queues one detection for `generation`. Returns `Ok(false)` without queueing
    /// if the previous request has not finished yet.
    pub fn request(&self, generation: Generation) -> Result<bool, EstimatorError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(false);
        }

        let sent = self
            .requests
            .as_ref()
            .map(|tx| tx.send(generation).is_ok())
            .unwrap_or(false);
        if !sent {
            self.in_flight.store(false, Ordering::SeqCst);
            return Err(EstimatorError::Disconnected);
        }
        Ok(true)
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }
}

impl Drop for DetectionWorker {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop.
        self.requests.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point2D;
    use crate::hand::{Hand, KEYPOINT_COUNT};
    use std::sync::mpsc::Receiver;
    use std::time::Duration;

    struct Camera {
        ready_after: u64,
        sequence: u64,
    }

    impl FrameProvider for Camera {
        fn next_frame(&mut self) -> Option<VideoFrame> {
            self.sequence += 1;
            let size = if self.sequence > self.ready_after {
                FrameSize::new(640, 480)
            } else {
                FrameSize::default()
            };
            Some(VideoFrame {
                size,
                sequence: self.sequence,
                pixels: Vec::new(),
            })
        }
    }

    struct Scripted(Vec<Result<HandObservation, EstimatorError>>);

    impl PoseEstimator for Scripted {
        fn estimate_hands(&mut self, _: &VideoFrame) -> Result<HandObservation, EstimatorError> {
            if self.0.is_empty() {
                Ok(vec![])
            } else {
                self.0.remove(0)
            }
        }
    }

    fn flat_hand() -> Hand {
        Hand::new([Point2D::new(10.0, 10.0); KEYPOINT_COUNT])
    }

    fn recv_detection(rx: &Receiver<GameEvent>) -> Detection {
        loop {
            match rx.recv_timeout(Duration::from_secs(2)) {
                Ok(GameEvent::Detection(d)) => return d,
                Ok(GameEvent::CameraReady) => continue,
                other => panic!("expected detection, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_not_ready_until_frame_has_size() {
        let mut dl = DetectionLoop::new(
            Camera {
                ready_after: 2,
                sequence: 0,
            },
            Scripted(vec![Ok(vec![flat_hand()])]),
        );
        assert_eq!(dl.detect(), DetectionOutcome::NotReady);
        assert_eq!(dl.detect(), DetectionOutcome::NotReady);
        assert_eq!(
            dl.detect(),
            DetectionOutcome::Observed {
                frame: FrameSize::new(640, 480),
                hands: vec![flat_hand()],
            }
        );
        assert_eq!(dl.cycles(), 3);
    }

    #[test]
    fn test_estimator_failure_is_reported_not_fatal() {
        let mut dl = DetectionLoop::new(
            Camera {
                ready_after: 0,
                sequence: 0,
            },
            Scripted(vec![
                Err(EstimatorError::Failed("model busy".into())),
                Ok(vec![flat_hand()]),
            ]),
        );
        assert_eq!(
            dl.detect(),
            DetectionOutcome::Failed(EstimatorError::Failed("model busy".into()))
        );
        assert!(matches!(dl.detect(), DetectionOutcome::Observed { .. }));
    }

    #[test]
    fn test_worker_tags_generation() {
        let (tx, rx) = mpsc::channel();
        let worker = DetectionWorker::spawn(
            DetectionLoop::new(
                Camera {
                    ready_after: 0,
                    sequence: 0,
                },
                Scripted(vec![]),
            ),
            tx,
        );
        let generation = Generation::first().next();
        assert_eq!(worker.request(generation), Ok(true));
        let d = recv_detection(&rx);
        assert_eq!(d.generation, generation);
        assert!(!worker.is_busy());
    }

    struct Slow(Duration);

    impl PoseEstimator for Slow {
        fn estimate_hands(&mut self, _: &VideoFrame) -> Result<HandObservation, EstimatorError> {
            thread::sleep(self.0);
            Ok(vec![])
        }
    }

    #[test]
    fn test_worker_refuses_overlapping_requests() {
        let (tx, rx) = mpsc::channel();
        let worker = DetectionWorker::spawn(
            DetectionLoop::new(
                Camera {
                    ready_after: 0,
                    sequence: 0,
                },
                Slow(Duration::from_millis(100)),
            ),
            tx,
        );
        let g = Generation::first();
        assert_eq!(worker.request(g), Ok(true));
        assert_eq!(worker.request(g), Ok(false));
        assert!(worker.is_busy());

        recv_detection(&rx);
        assert_eq!(worker.request(g), Ok(true));
        recv_detection(&rx);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_camera_ready_is_posted_before_estimation_finishes() {
        let (tx, rx) = mpsc::channel();
        let worker = DetectionWorker::spawn(
            DetectionLoop::new(
                Camera {
                    ready_after: 1,
                    sequence: 0,
                },
                Slow(Duration::from_millis(800)),
            ),
            tx,
        );
        let g = Generation::first();

        // first frame has no size: no readiness yet
        assert_eq!(worker.request(g), Ok(true));
        assert_eq!(recv_detection(&rx).outcome, DetectionOutcome::NotReady);

        assert_eq!(worker.request(g), Ok(true));
        match rx.recv_timeout(Duration::from_millis(400)) {
            Ok(GameEvent::CameraReady) => {}
            other => panic!("expected CameraReady while estimating, got {other:?}"),
        }
        assert!(worker.is_busy());
        assert!(matches!(
            recv_detection(&rx).outcome,
            DetectionOutcome::Observed { .. }
        ));
    }

    #[test]
    fn test_camera_ready_is_posted_once() {
        let (tx, rx) = mpsc::channel();
        let worker = DetectionWorker::spawn(
            DetectionLoop::new(
                Camera {
                    ready_after: 0,
                    sequence: 0,
                },
                Scripted(vec![]),
            ),
            tx,
        );
        let g = Generation::first();
        let mut ready = 0;
        for _ in 0..3 {
            assert_eq!(worker.request(g), Ok(true));
            loop {
                match rx.recv_timeout(Duration::from_secs(2)) {
                    Ok(GameEvent::CameraReady) => ready += 1,
                    Ok(GameEvent::Detection(_)) => break,
                    other => panic!("unexpected event {other:?}"),
                }
            }
        }
        assert_eq!(ready, 1);
    }
}
