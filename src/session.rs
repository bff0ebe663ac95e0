//! One play-through: from camera-ready until the target is hit.

use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::classifier::{Classification, HitClassifier, Hitbox, MappedHand};
use crate::config::Config;
use crate::detection::{Detection, DetectionOutcome};
use crate::geometry::{CoordinateMapper, FrameSize, Point2D, Viewport};
use crate::hand::Hand;
use crate::target::TargetPointGenerator;
use crate::timer::{Clock, ElapsedCounter, ElapsedTimer};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub hitbox_size: f64,
    pub margin: f64,
    pub max_hands: usize,
    pub clock: Clock,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Config::default().into()
    }
}

impl From<&Config> for SessionConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            hitbox_size: cfg.hitbox_size,
            margin: cfg.margin,
            max_hands: cfg.max_hands,
            clock: Clock::seconds(),
        }
    }
}

impl From<Config> for SessionConfig {
    fn from(cfg: Config) -> Self {
        Self::from(&cfg)
    }
}

/// Identifies one session among retries. Work started for an older generation is
/// discarded by newer sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
pub struct Generation(u64);

impl Generation {
    pub fn first() -> Self {
        Generation(0)
    }

    pub fn next(self) -> Self {
        Generation(self.0.wrapping_add(1))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GameState {
    #[default]
    Searching,
    Near,
    Hit,
}

impl GameState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, GameState::Hit)
    }

    fn from_classification(c: Classification) -> Self {
        match c {
            Classification::Searching => GameState::Searching,
            Classification::Near => GameState::Near,
            Classification::Hit => GameState::Hit,
        }
    }
}

/// Named signals for the audio layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Cue {
    #[strum(serialize = "near-cue")]
    Near,
    #[strum(serialize = "hit-cue")]
    Hit,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Finish {
    pub generation: Generation,
    pub elapsed_secs: u64,
    pub target: Point2D,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub from: GameState,
    pub to: GameState,
}

impl Transition {
    /// Cue played on entering `to`.
    pub fn entry_cue(&self) -> Option<Cue> {
        match self.to {
            GameState::Searching => None,
            GameState::Near => Some(Cue::Near),
            GameState::Hit => Some(Cue::Hit),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionEvent {
    StateChanged(Transition),
    Cue(Cue),
    Finished(Finish),
}

/// Searching/Near/Hit with Hit terminal.
#[derive(Debug, Clone, Default)]
pub struct SessionStateMachine {
    state: GameState,
}

impl SessionStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    /// `None` means no hand was observed this cycle and leaves the state alone.
    /// Returns the transition if the state changed.
    pub fn advance(&mut self, classification: Option<Classification>) -> Option<Transition> {
        if self.state.is_terminal() {
            return None;
        }
        let next = GameState::from_classification(classification?);
        if next == self.state {
            return None;
        }
        let transition = Transition {
            from: self.state,
            to: next,
        };
        self.state = next;
        Some(transition)
    }
}

pub type FinishCallback = Box<dyn FnOnce(Finish) + Send + 'static>;

pub struct Session {
    generation: Generation,
    viewport: Viewport,
    target: Point2D,
    classifier: HitClassifier,
    machine: SessionStateMachine,
    timer: ElapsedTimer,
    on_finish: Option<FinishCallback>,
    hands: Vec<MappedHand>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("generation", &self.generation)
            .field("viewport", &self.viewport)
            .field("target", &self.target)
            .field("state", &self.machine.state())
            .field("timer", &self.timer)
            .finish()
    }
}

impl Session {
    /// Starts a session with a freshly drawn target.
    pub fn new<R: Rng>(
        generation: Generation,
        config: &SessionConfig,
        viewport: Viewport,
        rng: &mut R,
    ) -> Self {
        let target = TargetPointGenerator::new(config.margin).generate(viewport, rng);
        Self::with_target(generation, config, viewport, target)
    }

    /// Starts a session around a known target (replays, tests).
    pub fn with_target(
        generation: Generation,
        config: &SessionConfig,
        viewport: Viewport,
        target: Point2D,
    ) -> Self {
        info!(
            generation = generation.value(),
            target_x = target.x,
            target_y = target.y,
            "session started"
        );
        Self {
            generation,
            viewport,
            target,
            classifier: HitClassifier::new(config.hitbox_size, config.max_hands),
            machine: SessionStateMachine::new(),
            timer: ElapsedTimer::new(config.clock),
            on_finish: None,
            hands: Vec::new(),
        }
    }

    /// Called once, when the session reaches `Hit`.
    pub fn on_finish<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(Finish) + Send + 'static,
    {
        self.on_finish = Some(Box::new(callback));
        self
    }

    /// Starts the elapsed counter. Later calls, and calls after the session has
    /// finished, do nothing.
    pub fn camera_ready(&mut self) -> bool {
        if self.machine.state().is_terminal() {
            return false;
        }
        self.timer.start()
    }

    /// Advances a manual clock by one second.
    pub fn tick_clock(&mut self) -> bool {
        self.timer.tick()
    }

    /// Feeds one detection cycle. Detections requested by another generation are
    /// dropped.
    pub fn observe(&mut self, detection: &Detection) -> Vec<SessionEvent> {
        if detection.generation != self.generation {
            debug!(
                stale = detection.generation.value(),
                current = self.generation.value(),
                "dropping stale detection"
            );
            return Vec::new();
        }

        match &detection.outcome {
            DetectionOutcome::NotReady => Vec::new(),
            DetectionOutcome::Failed(_) => {
                self.camera_ready();
                Vec::new()
            }
            DetectionOutcome::Observed { frame, hands } => {
                self.camera_ready();
                self.apply_hands(*frame, hands)
            }
        }
    }

    /// Maps camera-space hands into this session's viewport and classifies them.
    pub fn apply_hands(&mut self, frame: FrameSize, hands: &[Hand]) -> Vec<SessionEvent> {
        let Some(mapper) = CoordinateMapper::new(frame, self.viewport) else {
            return Vec::new();
        };
        let mapped = hands
            .iter()
            .map(|hand| MappedHand::from_camera(hand, &mapper))
            .collect();
        self.apply_mapped(mapped)
    }

    /// Classifies hands that are already in screen space.
    pub fn apply_mapped(&mut self, hands: Vec<MappedHand>) -> Vec<SessionEvent> {
        let classification = self.classifier.classify(&hands, self.target);
        if !hands.is_empty() {
            self.hands = hands;
        }

        let Some(transition) = self.machine.advance(classification) else {
            return Vec::new();
        };
        debug!(from = %transition.from, to = %transition.to, "state changed");

        let mut events = vec![SessionEvent::StateChanged(transition)];
        if let Some(cue) = transition.entry_cue() {
            events.push(SessionEvent::Cue(cue));
        }
        if transition.to.is_terminal() {
            events.push(SessionEvent::Finished(self.finish()));
        }
        events
    }

    fn finish(&mut self) -> Finish {
        self.timer.stop();
        let finish = Finish {
            generation: self.generation,
            elapsed_secs: self.timer.elapsed_secs(),
            target: self.target,
        };
        info!(elapsed_secs = finish.elapsed_secs, "target found");
        if let Some(callback) = self.on_finish.take() {
            callback(finish);
        }
        finish
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn state(&self) -> GameState {
        self.machine.state()
    }

    pub fn target(&self) -> Point2D {
        self.target
    }

    pub fn hitbox(&self) -> Hitbox {
        self.classifier.hitbox(self.target)
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.timer.elapsed_secs()
    }

    pub fn elapsed_counter(&self) -> ElapsedCounter {
        self.timer.counter()
    }

    pub fn is_timer_running(&self) -> bool {
        self.timer.is_running()
    }

    /// Hands from the most recent cycle that saw any, in screen space.
    pub fn last_hands(&self) -> &[MappedHand] {
        &self.hands
    }
}
