use std::sync::mpsc::Sender;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::detection::{
    Detection, DetectionLoop, DetectionOutcome, DetectionWorker, FrameProvider, PoseEstimator,
};
use crate::runtime::GameEvent;
use crate::session::{Cue, Finish, GameState, Generation, Session, SessionConfig, SessionEvent};
use crate::simulate::{Puppet, PuppetEstimator, SyntheticCamera};
use crate::verdict::Verdict;

/// Screen units the puppet hand moves per arrow key press.
pub const MOVE_STEP: f64 = 20.0;

/// Frames the synthetic camera spends "loading" before it reports a size.
const CAMERA_WARMUP_FRAMES: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppState {
    Playing,
    Results(Finish),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyOutcome {
    Continue,
    Quit,
}

/// Terminal game: a session, the detection worker feeding it, and the puppet hand
/// the player steers.
pub struct App {
    pub config: Config,
    pub state: AppState,
    pub session: Session,
    pub puppet: Puppet,
    /// Draw the hidden hitbox (debug aid).
    pub reveal: bool,
    pub last_cue: Option<Cue>,
    pub last_error: Option<String>,
    camera_ready: bool,
    worker: DetectionWorker,
    events: Sender<GameEvent>,
    generation: Generation,
    rng: StdRng,
}

impl App {
    pub fn new(config: Config, events: Sender<GameEvent>) -> Self {
        let viewport = config.viewport();
        let puppet = Puppet::new(viewport);
        let camera = SyntheticCamera::new(config.camera(), CAMERA_WARMUP_FRAMES);
        let estimator = PuppetEstimator::new(puppet.clone(), viewport);
        Self::with_pipeline(config, events, puppet, camera, estimator)
    }

    /// Builds the app around any camera and estimator; `puppet` only receives key input.
    pub fn with_pipeline<P: FrameProvider, E: PoseEstimator>(
        config: Config,
        events: Sender<GameEvent>,
        puppet: Puppet,
        provider: P,
        estimator: E,
    ) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let generation = Generation::first();
        let session = Self::start_session(&config, generation, &events, &mut rng);
        let worker =
            DetectionWorker::spawn(DetectionLoop::new(provider, estimator), events.clone());

        Self {
            config,
            state: AppState::Playing,
            session,
            puppet,
            reveal: false,
            last_cue: None,
            last_error: None,
            camera_ready: false,
            worker,
            events,
            generation,
            rng,
        }
    }

    fn start_session(
        config: &Config,
        generation: Generation,
        events: &Sender<GameEvent>,
        rng: &mut StdRng,
    ) -> Session {
        let finished = events.clone();
        Session::new(generation, &SessionConfig::from(config), config.viewport(), rng).on_finish(
            move |finish| {
                let _ = finished.send(GameEvent::Finished(finish));
            },
        )
    }

    /// Starts over with a new target. Anything still in flight for the old
    /// session is ignored when it arrives.
    pub fn reset(&mut self) {
        self.generation = self.generation.next();
        self.session =
            Self::start_session(&self.config, self.generation, &self.events, &mut self.rng);
        self.state = AppState::Playing;
        self.last_cue = None;
        self.last_error = None;
        // the camera is already running, so the new round's clock starts now
        if self.camera_ready {
            self.session.camera_ready();
        }
        info!(generation = self.generation.value(), "retry");
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.session.elapsed_secs()
    }

    pub fn verdict(&self) -> Option<Verdict> {
        match self.state {
            AppState::Playing => None,
            AppState::Results(finish) => Some(Verdict::from_elapsed(finish.elapsed_secs)),
        }
    }

    /// Frame cadence: asks for the next detection unless one is still running.
    pub fn on_tick(&mut self) {
        if self.state != AppState::Playing || self.session.state().is_terminal() {
            return;
        }
        match self.worker.request(self.generation) {
            Ok(true) => {}
            Ok(false) => debug!("detection still in flight, skipping frame"),
            Err(err) => {
                warn!(error = %err, "could not request detection");
                self.last_error = Some(err.to_string());
            }
        }
    }

    pub fn is_camera_ready(&self) -> bool {
        self.camera_ready
    }

    /// The camera produced its first frame. Starts the clock without waiting for
    /// the estimator.
    pub fn on_camera_ready(&mut self) {
        self.camera_ready = true;
        if self.state == AppState::Playing {
            self.session.camera_ready();
        }
    }

    pub fn on_detection(&mut self, detection: Detection) {
        if let DetectionOutcome::Failed(err) = &detection.outcome {
            if detection.generation == self.generation {
                self.last_error = Some(err.to_string());
            }
        }
        for event in self.session.observe(&detection) {
            match event {
                SessionEvent::Cue(cue) => {
                    info!(%cue, "cue");
                    self.last_cue = Some(cue);
                }
                SessionEvent::StateChanged(t) => {
                    if t.to == GameState::Searching {
                        self.last_cue = None;
                    }
                }
                SessionEvent::Finished(_) => {}
            }
        }
    }

    /// Termination callback delivery; moves to the results screen.
    pub fn on_finished(&mut self, finish: Finish) {
        if finish.generation == self.generation && self.state == AppState::Playing {
            self.state = AppState::Results(finish);
        }
    }

    pub fn on_event(&mut self, event: GameEvent) -> KeyOutcome {
        match event {
            GameEvent::Tick => self.on_tick(),
            GameEvent::Resize => {}
            GameEvent::CameraReady => self.on_camera_ready(),
            GameEvent::Detection(d) => self.on_detection(d),
            GameEvent::Finished(f) => self.on_finished(f),
            GameEvent::Key(key) => return self.on_key(key),
        }
        KeyOutcome::Continue
    }

    pub fn on_key(&mut self, key: KeyEvent) -> KeyOutcome {
        if key.code == KeyCode::Esc
            || (key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c'))
        {
            return KeyOutcome::Quit;
        }

        match self.state {
            AppState::Playing => match key.code {
                KeyCode::Left => self.puppet.move_active(-MOVE_STEP, 0.0),
                KeyCode::Right => self.puppet.move_active(MOVE_STEP, 0.0),
                KeyCode::Up => self.puppet.move_active(0.0, -MOVE_STEP),
                KeyCode::Down => self.puppet.move_active(0.0, MOVE_STEP),
                KeyCode::Char(' ') => self.puppet.toggle_active(),
                KeyCode::Tab => self.puppet.switch_active(),
                KeyCode::Char('v') => self.reveal = !self.reveal,
                KeyCode::Char('r') => self.reset(),
                _ => {}
            },
            AppState::Results(_) => {
                if let KeyCode::Char('r') = key.code {
                    self.reset();
                }
            }
        }
        KeyOutcome::Continue
    }
}
