// Library surface for the binary, headless/integration tests and replays.
pub mod app;
pub mod app_dirs;
pub mod classifier;
pub mod config;
pub mod detection;
pub mod error;
pub mod geometry;
pub mod hand;
pub mod replay;
pub mod runtime;
pub mod session;
pub mod simulate;
pub mod target;
pub mod timer;
pub mod ui;
pub mod util;
pub mod verdict;

pub use app::{App, AppState, KeyOutcome};
