//! Headless playback of a recorded keypoint stream through the full engine.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::detection::{Detection, DetectionLoop, DetectionOutcome};
use crate::geometry::Point2D;
use crate::session::{Cue, GameState, Generation, Session, SessionConfig, SessionEvent};
use crate::simulate::Recording;
use crate::target::TargetPointGenerator;
use crate::timer::Clock;
use crate::verdict::Verdict;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameSummary {
    pub state: GameState,
    pub elapsed_secs: u64,
    pub target: Point2D,
    pub frames: usize,
    pub failures: usize,
    pub near_cues: usize,
    pub verdict: Option<Verdict>,
}

impl GameSummary {
    pub fn message(&self) -> Option<&'static str> {
        self.verdict.map(|v| v.message())
    }
}

impl std::fmt::Display for GameSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "state:    {}", self.state)?;
        writeln!(f, "elapsed:  {}s", self.elapsed_secs)?;
        writeln!(f, "target:   ({:.1}, {:.1})", self.target.x, self.target.y)?;
        writeln!(
            f,
            "frames:   {} ({} failed, {} near cues)",
            self.frames, self.failures, self.near_cues
        )?;
        match (self.verdict, self.message()) {
            (Some(v), Some(msg)) => write!(f, "verdict:  {v}: {msg}"),
            _ => write!(f, "verdict:  target not found"),
        }
    }
}

/// Runs `recording` until it ends or the target is hit. The elapsed counter
/// follows the recording's frame rate from the first ready frame on.
pub fn replay(recording: &Recording, config: &Config) -> GameSummary {
    let session_config = SessionConfig {
        clock: Clock::Manual,
        ..SessionConfig::from(config)
    };
    let generation = Generation::first();
    let viewport = config.viewport();
    let mut session = match recording.target {
        Some(recorded) => {
            let target = TargetPointGenerator::new(config.margin).clamp(viewport, recorded);
            if target != recorded {
                warn!(
                    x = recorded.x,
                    y = recorded.y,
                    "recorded target outside the playable area, clamping"
                );
            }
            Session::with_target(generation, &session_config, viewport, target)
        }
        None => {
            let mut rng = match config.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            Session::new(generation, &session_config, viewport, &mut rng)
        }
    };

    let (camera, estimator) = recording.feed();
    let mut detection_loop = DetectionLoop::new(camera, estimator);
    let mut ready_frames: u64 = 0;
    let mut frames = 0;
    let mut failures = 0;
    let mut near_cues = 0;

    for _ in 0..recording.frames.len() {
        let outcome = detection_loop.detect();
        frames += 1;
        if matches!(outcome, DetectionOutcome::Failed(_)) {
            failures += 1;
        }

        let events = session.observe(&Detection {
            generation,
            outcome,
        });
        near_cues += events
            .iter()
            .filter(|e| matches!(e, SessionEvent::Cue(Cue::Near)))
            .count();
        if session.state().is_terminal() {
            break;
        }

        if session.is_timer_running() {
            ready_frames += 1;
            let due = (ready_frames as f64 / recording.fps + 1e-9).floor() as u64;
            while session.elapsed_secs() < due && session.tick_clock() {}
        }
    }

    let state = session.state();
    let summary = GameSummary {
        state,
        elapsed_secs: session.elapsed_secs(),
        target: session.target(),
        frames,
        failures,
        near_cues,
        verdict: state
            .is_terminal()
            .then(|| Verdict::from_elapsed(session.elapsed_secs())),
    };
    info!(state = %summary.state, elapsed_secs = summary.elapsed_secs, frames, "replay finished");
    summary
}
