use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::error::{Error, Result};
use crate::golden::{BASE_FADE_MS, DEFAULT_SPAWN_INTERVAL};
use crate::green::{DEFAULT_SPAWN_CHANCE, DEFAULT_WORD_THRESHOLD};

pub const DEFAULT_WORDS_PER_RUN: usize = 30;
pub const FEVER_RUSH_WORDS: u32 = 50;
pub const FEVER_GOLDEN_INTERVAL: usize = 10;
pub const DEFAULT_TICK_MS: u64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub words_per_run: usize,
    pub endless: bool,
    pub golden_interval: usize,
    pub golden_base_fade_ms: u64,
    pub green_word_threshold: u32,
    pub green_spawn_chance: f64,
    pub fever_rush_words: u32,
    pub fever_golden_interval: usize,
    pub tick_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            words_per_run: DEFAULT_WORDS_PER_RUN,
            endless: false,
            golden_interval: DEFAULT_SPAWN_INTERVAL,
            golden_base_fade_ms: BASE_FADE_MS,
            green_word_threshold: DEFAULT_WORD_THRESHOLD,
            green_spawn_chance: DEFAULT_SPAWN_CHANCE,
            fever_rush_words: FEVER_RUSH_WORDS,
            fever_golden_interval: FEVER_GOLDEN_INTERVAL,
            tick_ms: DEFAULT_TICK_MS,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.words_per_run == 0 {
            return Err(Error::InvalidConfig("words_per_run must be positive".into()));
        }
        if self.golden_interval == 0 || self.fever_golden_interval == 0 {
            return Err(Error::InvalidConfig("golden intervals must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.green_spawn_chance) {
            return Err(Error::InvalidConfig(format!(
                "green_spawn_chance {} is not within 0..=1",
                self.green_spawn_chance
            )));
        }
        if self.tick_ms == 0 {
            return Err(Error::InvalidConfig("tick_ms must be positive".into()));
        }
        Ok(())
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path(),
        }
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
    /// Missing, unreadable or invalid files fall back to defaults.
    fn load(&self) -> Config {
        fs::read(&self.path)
            .ok()
            .and_then(|bytes| serde_json::from_slice::<Config>(&bytes).ok())
            .filter(|cfg| cfg.validate().is_ok())
            .unwrap_or_default()
    }

    fn save(&self, cfg: &Config) -> Result<()> {
        cfg.validate()?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(cfg)?)?;
        Ok(())
    }
}
