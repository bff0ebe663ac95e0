use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use palmseek::config::Config;
use palmseek::detection::{PoseEstimator, VideoFrame};
use palmseek::error::EstimatorError;
use palmseek::hand::HandObservation;
use palmseek::runtime::{FixedTicker, GameEvent, Runner, TestEventSource};
use palmseek::session::{GameState, Generation};
use palmseek::simulate::{Puppet, PuppetEstimator, SyntheticCamera};
use palmseek::verdict::Verdict;
use palmseek::{App, AppState, KeyOutcome};

fn config() -> Config {
    Config {
        seed: Some(42),
        ..Config::default()
    }
}

fn headless_app(
    estimator: impl PoseEstimator,
    puppet: Puppet,
) -> (App, Runner<TestEventSource, FixedTicker>) {
    let runner = Runner::new(TestEventSource::new(), FixedTicker::from_millis(5));
    let cfg = config();
    let camera = SyntheticCamera::new(cfg.camera(), 2);
    let app = App::with_pipeline(cfg, runner.sender(), puppet, camera, estimator);
    (app, runner)
}

/// Steps the loop until `done` holds or the step budget runs out.
fn drive(
    app: &mut App,
    runner: &Runner<TestEventSource, FixedTicker>,
    steps: u32,
    done: impl Fn(&App) -> bool,
) -> bool {
    for _ in 0..steps {
        if app.on_event(runner.step()) == KeyOutcome::Quit {
            return false;
        }
        if done(app) {
            return true;
        }
    }
    false
}

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

/// Arrow presses that bring the active puppet hand onto `app`'s target.
fn steer_onto_target(app: &App, runner: &Runner<TestEventSource, FixedTicker>) {
    let palm = app.puppet.palms()[0];
    let target = app.session.target();
    let step = palmseek::app::MOVE_STEP;
    let dx = ((target.x - palm.x) / step).round() as i64;
    let dy = ((target.y - palm.y) / step).round() as i64;
    let tx = runner.sender();
    let horizontal = if dx < 0 { KeyCode::Left } else { KeyCode::Right };
    let vertical = if dy < 0 { KeyCode::Up } else { KeyCode::Down };
    for _ in 0..dx.abs() {
        tx.send(GameEvent::Key(key(horizontal))).unwrap();
    }
    for _ in 0..dy.abs() {
        tx.send(GameEvent::Key(key(vertical))).unwrap();
    }
}

// Headless play using the internal runtime without a TTY: steer the puppet onto
// the target and wait for the results screen.
#[test]
fn headless_hand_finds_target() {
    let puppet = Puppet::new(config().viewport());
    let estimator = PuppetEstimator::new(puppet.clone(), config().viewport());
    let (mut app, runner) = headless_app(estimator, puppet);

    steer_onto_target(&app, &runner);
    let finished = drive(&mut app, &runner, 2000, |a| {
        matches!(a.state, AppState::Results(_))
    });

    assert!(finished, "target should have been found");
    assert_eq!(app.session.state(), GameState::Hit);
    assert!(!app.session.is_timer_running());
    match app.state {
        AppState::Results(finish) => {
            assert_eq!(finish.generation, app.generation());
            assert_eq!(finish.target, app.session.target());
            assert_eq!(app.verdict(), Some(Verdict::from_elapsed(finish.elapsed_secs)));
        }
        AppState::Playing => unreachable!(),
    }
}

#[test]
fn hidden_hand_never_finishes() {
    let puppet = Puppet::new(config().viewport());
    let estimator = PuppetEstimator::new(puppet.clone(), config().viewport());
    let (mut app, runner) = headless_app(estimator, puppet);

    app.on_key(key(KeyCode::Char(' ')));
    assert!(app.puppet.palms().is_empty());

    // camera comes up, no hands: timer runs but nothing is classified
    let ready = drive(&mut app, &runner, 500, |a| a.session.is_timer_running());
    assert!(ready);
    drive(&mut app, &runner, 50, |_| false);
    assert_eq!(app.session.state(), GameState::Searching);
    assert_eq!(app.state, AppState::Playing);
}

#[test]
fn retry_discards_detections_from_previous_round() {
    let puppet = Puppet::new(config().viewport());
    let estimator = PuppetEstimator::new(puppet.clone(), config().viewport());
    let (mut app, runner) = headless_app(estimator, puppet);

    // wait out the camera warmup
    drive(&mut app, &runner, 500, |a| a.session.is_timer_running());
    let old = app.generation();

    app.on_tick();
    let detection = loop {
        match runner.step() {
            GameEvent::Detection(d) => break d,
            _ => continue,
        }
    };
    assert_eq!(detection.generation, old);

    app.on_key(key(KeyCode::Char('r')));
    assert_eq!(app.generation(), old.next());
    app.on_event(GameEvent::Detection(detection));

    assert_eq!(app.session.generation(), old.next());
    assert_eq!(app.session.state(), GameState::Searching);
    assert!(app.session.last_hands().is_empty());
    // the camera stayed up across the retry
    assert!(app.session.is_timer_running());
}

/// Fails the first `failures` calls, then reports a hand sitting on the screen center.
struct FlakyEstimator {
    calls: Arc<AtomicUsize>,
    failures: usize,
    inner: PuppetEstimator,
}

impl PoseEstimator for FlakyEstimator {
    fn estimate_hands(&mut self, frame: &VideoFrame) -> Result<HandObservation, EstimatorError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            return Err(EstimatorError::Failed(format!("model hiccup {n}")));
        }
        self.inner.estimate_hands(frame)
    }
}

#[test]
fn estimator_failures_do_not_stop_the_game() {
    let puppet = Puppet::new(config().viewport());
    let calls = Arc::new(AtomicUsize::new(0));
    let estimator = FlakyEstimator {
        calls: Arc::clone(&calls),
        failures: 3,
        inner: PuppetEstimator::new(puppet.clone(), config().viewport()),
    };
    let (mut app, runner) = headless_app(estimator, puppet);

    let errored = drive(&mut app, &runner, 500, |a| a.last_error.is_some());
    assert!(errored);
    assert!(app.session.is_timer_running());

    steer_onto_target(&app, &runner);
    let finished = drive(&mut app, &runner, 2000, |a| {
        matches!(a.state, AppState::Results(_))
    });
    assert!(finished);
    assert!(calls.load(Ordering::SeqCst) > 3);
}

/// A model that takes its time on every frame.
struct SlowEstimator(Duration);

impl PoseEstimator for SlowEstimator {
    fn estimate_hands(&mut self, _: &VideoFrame) -> Result<HandObservation, EstimatorError> {
        std::thread::sleep(self.0);
        Ok(vec![])
    }
}

#[test]
fn clock_starts_with_the_camera_not_the_estimator() {
    let runner = Runner::new(TestEventSource::new(), FixedTicker::from_millis(5));
    let cfg = config();
    let camera = SyntheticCamera::new(cfg.camera(), 0);
    let puppet = Puppet::new(cfg.viewport());
    let mut app = App::with_pipeline(
        cfg,
        runner.sender(),
        puppet,
        camera,
        SlowEstimator(Duration::from_millis(1500)),
    );

    let started = Instant::now();
    let running = drive(&mut app, &runner, 1000, |a| {
        a.session.is_timer_running() || started.elapsed() > Duration::from_millis(1200)
    });

    assert!(running);
    assert!(app.is_camera_ready());
    assert!(app.session.is_timer_running());
    assert!(started.elapsed() < Duration::from_millis(1200));
    // no detection has come back yet
    assert!(app.session.last_hands().is_empty());
}

#[test]
fn stale_finish_is_ignored() {
    let puppet = Puppet::new(config().viewport());
    let estimator = PuppetEstimator::new(puppet.clone(), config().viewport());
    let (mut app, _runner) = headless_app(estimator, puppet);

    app.reset();
    app.on_event(GameEvent::Finished(palmseek::session::Finish {
        generation: Generation::first(),
        elapsed_secs: 1,
        target: app.session.target(),
    }));
    assert_eq!(app.state, AppState::Playing);
}

#[test]
fn escape_and_ctrl_c_quit() {
    let puppet = Puppet::new(config().viewport());
    let estimator = PuppetEstimator::new(puppet.clone(), config().viewport());
    let (mut app, _runner) = headless_app(estimator, puppet);

    assert_eq!(app.on_key(key(KeyCode::Char('x'))), KeyOutcome::Continue);
    assert_eq!(app.on_key(key(KeyCode::Esc)), KeyOutcome::Quit);
    assert_eq!(
        app.on_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
        KeyOutcome::Quit
    );
}
