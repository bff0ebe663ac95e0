use clap::{error::ErrorKind, ArgAction, CommandFactory, Parser, Subcommand};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use palmseek::{
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore, Overrides},
    error::ConfigError,
    replay::replay,
    runtime::{CrosstermEventSource, Runner},
    simulate::Recording,
    ui::screen::draw,
    App, KeyOutcome,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::{Path, PathBuf},
};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// find the hidden target with the palm of your hand
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A hide-and-seek game driven by hand keypoints. A target is hidden somewhere on the screen; move a hand over it. You are told when you get close, and the clock stops when your palm lands on it."
)]
pub struct Cli {
    #[clap(subcommand)]
    command: Option<Command>,

    /// screen width in game units
    #[clap(long, global = true)]
    width: Option<f64>,

    /// screen height in game units
    #[clap(long, global = true)]
    height: Option<f64>,

    /// side length of the hidden hitbox
    #[clap(long, global = true)]
    hitbox_size: Option<f64>,

    /// keep the target at least this far from the screen edges
    #[clap(long, global = true)]
    margin: Option<f64>,

    /// number of hands considered per frame
    #[clap(long, global = true)]
    max_hands: Option<usize>,

    /// seed for target placement
    #[clap(long, global = true)]
    seed: Option<u64>,

    /// config file to use instead of the one in the user config directory
    #[clap(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// verbose logging (can be specified multiple times)
    #[clap(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Command {
    /// play in the terminal with a keyboard-driven hand (default)
    Play {
        /// show the hidden hitbox
        #[clap(long)]
        reveal: bool,
    },
    /// run a recorded keypoint stream through the game and print the outcome
    Replay {
        /// JSON recording
        file: PathBuf,

        /// print the summary as JSON
        #[clap(long)]
        json: bool,
    },
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            viewport_width: self.width,
            viewport_height: self.height,
            hitbox_size: self.hitbox_size,
            margin: self.margin,
            max_hands: self.max_hands,
            seed: self.seed,
        }
    }

    fn load_config(&self) -> Result<Config, ConfigError> {
        let store = match &self.config {
            Some(path) => FileConfigStore::with_path(path),
            None => FileConfigStore::new(),
        };
        let config = store.load().with_overrides(&self.overrides());
        config.validate()?;
        Ok(config)
    }

    fn subcommand(&self) -> Command {
        self.command
            .clone()
            .unwrap_or(Command::Play { reveal: false })
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    match cli.subcommand() {
        Command::Replay { file, json } => {
            init_stderr_logging(cli.verbose);
            let config = config_or_exit(&cli);
            run_replay(&file, json, &config)
        }
        Command::Play { reveal } => {
            if !stdin().is_tty() {
                let mut cmd = Cli::command();
                cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
            }
            let _guard = init_file_logging(cli.verbose);
            let config = config_or_exit(&cli);
            play(config, reveal)
        }
    }
}

fn config_or_exit(cli: &Cli) -> Config {
    match cli.load_config() {
        Ok(config) => config,
        Err(err) => {
            let mut cmd = Cli::command();
            cmd.error(ErrorKind::InvalidValue, err).exit()
        }
    }
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("palmseek={level},warn")))
}

/// The game owns the terminal, so logs go to a file under the state directory.
fn init_file_logging(verbose: u8) -> Option<WorkerGuard> {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let dir = AppDirs::log_dir()?;
    std::fs::create_dir_all(&dir).ok()?;
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(&dir, "palmseek.log"));
    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
        .init();
    Some(guard)
}

fn init_stderr_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn run_replay(file: &Path, json: bool, config: &Config) -> Result<(), Box<dyn Error>> {
    let recording = Recording::load(file)?;
    let summary = replay(&recording, config);
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{summary}");
    }
    Ok(())
}

fn play(config: Config, reveal: bool) -> Result<(), Box<dyn Error>> {
    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, config, reveal);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    config: Config,
    reveal: bool,
) -> Result<(), Box<dyn Error>> {
    // ticks are the detection frame cadence
    let runner = Runner::new(CrosstermEventSource::new(), config.frame_ticker());
    let mut app = App::new(config, runner.sender());
    app.reveal = reveal;
    info!("game started");

    loop {
        terminal.draw(|f| draw(&app, f))?;
        if app.on_event(runner.step()) == KeyOutcome::Quit {
            break;
        }
    }

    info!("game closed");
    Ok(())
}
