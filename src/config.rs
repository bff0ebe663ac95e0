use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::ConfigError;
use crate::geometry::{FrameSize, Viewport};
use crate::runtime::FixedTicker;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub camera_width: u32,
    pub camera_height: u32,
    pub hitbox_size: f64,
    pub margin: f64,
    pub max_hands: usize,
    pub frame_interval_ms: u64,
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            viewport_width: 800.0,
            viewport_height: 600.0,
            camera_width: 640,
            camera_height: 480,
            hitbox_size: 100.0,
            margin: 100.0,
            max_hands: 2,
            frame_interval_ms: 33,
            seed: None,
        }
    }
}

/// Command-line values that take precedence over the stored config.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub viewport_width: Option<f64>,
    pub viewport_height: Option<f64>,
    pub hitbox_size: Option<f64>,
    pub margin: Option<f64>,
    pub max_hands: Option<usize>,
    pub seed: Option<u64>,
}

impl Config {
    pub fn with_overrides(mut self, o: &Overrides) -> Self {
        if let Some(v) = o.viewport_width {
            self.viewport_width = v;
        }
        if let Some(v) = o.viewport_height {
            self.viewport_height = v;
        }
        if let Some(v) = o.hitbox_size {
            self.hitbox_size = v;
        }
        if let Some(v) = o.margin {
            self.margin = v;
        }
        if let Some(v) = o.max_hands {
            self.max_hands = v;
        }
        if o.seed.is_some() {
            self.seed = o.seed;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let finite = [
            self.viewport_width,
            self.viewport_height,
            self.hitbox_size,
            self.margin,
        ];
        if finite.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::Invalid(
                "viewport, hitbox_size and margin must be finite numbers".into(),
            ));
        }
        if !(self.viewport_width > 0.0 && self.viewport_height > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "viewport must be positive, got {}x{}",
                self.viewport_width, self.viewport_height
            )));
        }
        if !self.camera().is_ready() {
            return Err(ConfigError::Invalid(format!(
                "camera size must be positive, got {}x{}",
                self.camera_width, self.camera_height
            )));
        }
        if !(self.hitbox_size > 0.0) {
            return Err(ConfigError::Invalid("hitbox_size must be positive".into()));
        }
        // the hitbox around any generated target has to stay on screen
        if self.margin < self.hitbox_size / 2.0 {
            return Err(ConfigError::Invalid(format!(
                "margin must be at least half the hitbox size ({}), got {}",
                self.hitbox_size / 2.0,
                self.margin
            )));
        }
        if self.viewport_width < self.hitbox_size || self.viewport_height < self.hitbox_size {
            return Err(ConfigError::Invalid(format!(
                "viewport {}x{} is smaller than the hitbox ({})",
                self.viewport_width, self.viewport_height, self.hitbox_size
            )));
        }
        if self.max_hands == 0 {
            return Err(ConfigError::Invalid("max_hands must be at least 1".into()));
        }
        if self.frame_interval_ms == 0 {
            return Err(ConfigError::Invalid("frame_interval_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.viewport_width, self.viewport_height)
    }

    pub fn camera(&self) -> FrameSize {
        FrameSize::new(self.camera_width, self.camera_height)
    }

    pub fn frame_ticker(&self) -> FixedTicker {
        FixedTicker::from_millis(self.frame_interval_ms)
    }

}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> Result<(), ConfigError>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "palmseek") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("palmseek_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    /// Missing file gives defaults silently; an unreadable one gives defaults with a warning.
    fn load(&self) -> Config {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(_) => return Config::default(),
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => cfg,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "ignoring malformed config");
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}
