//! The garden: everything that outlives a run, kept as one JSON blob.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::app_dirs::AppDirs;
use crate::error::{Error, Result};
use crate::stats::RunResult;
use crate::upgrades::Seed;

pub const FINAL_TUTORIAL_BEAT: u8 = 3;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GardenState {
    /// 0 before the first beat, 3 once the story is done
    pub tutorial_beat: u8,
    pub tutorial_complete: bool,
    pub seed: Option<Seed>,
    pub unlocked_upgrades: Vec<String>,
    pub active_upgrades: Vec<String>,
    pub run_history: Vec<RunResult>,
    pub total_words_typed: u64,
    pub session_sol: u64,
    pub lifetime_sol: u64,
}

impl GardenState {
    pub fn add_run(mut self, run: RunResult) -> Self {
        self.total_words_typed += u64::from(run.words);
        self.run_history.push(run);
        self
    }

    /// Unlocking also activates; unlocking twice changes nothing.
    pub fn unlock_upgrade(mut self, id: &str) -> Self {
        if !self.unlocked_upgrades.iter().any(|u| u == id) {
            self.unlocked_upgrades.push(id.to_string());
            self.active_upgrades.push(id.to_string());
        }
        self
    }

    /// Flips an unlocked upgrade on or off; locked ids are ignored.
    pub fn toggle_upgrade(mut self, id: &str) -> Self {
        if !self.unlocked_upgrades.iter().any(|u| u == id) {
            return self;
        }
        match self.active_upgrades.iter().position(|u| u == id) {
            Some(index) => {
                self.active_upgrades.remove(index);
            }
            None => self.active_upgrades.push(id.to_string()),
        }
        self
    }

    /// Moves the story on one beat. Reaching the last beat completes the
    /// tutorial; a walkthrough already finished stays finished.
    pub fn advance_tutorial(mut self) -> Self {
        self.tutorial_beat = (self.tutorial_beat + 1).min(FINAL_TUTORIAL_BEAT);
        self.tutorial_complete |= self.tutorial_beat == FINAL_TUTORIAL_BEAT;
        self
    }

    pub fn set_seed(mut self, seed: Seed) -> Self {
        self.seed = Some(seed);
        self
    }

    /// The most recent `n` runs, newest last
    pub fn recent_runs(&self, n: usize) -> &[RunResult] {
        let start = self.run_history.len().saturating_sub(n);
        &self.run_history[start..]
    }
}

pub trait GardenStore {
    /// `None` when nothing is stored or the stored blob is unreadable.
    fn load(&self) -> Option<GardenState>;
    fn save(&self, state: &GardenState) -> Result<()>;

    fn clear(&self) -> Result<()>;

    /// Load (or default), transform, save; returns the saved state.
    fn update(&self, f: &dyn Fn(GardenState) -> GardenState) -> Result<GardenState> {
        let next = f(self.load().unwrap_or_default());
        self.save(&next)?;
        Ok(next)
    }
}

fn parse(raw: &[u8]) -> Option<GardenState> {
    match serde_json::from_slice::<GardenState>(raw) {
        Ok(state) => Some(state),
        Err(e) => {
            warn!(error = %e, "stored garden is unreadable, starting fresh");
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileGardenStore {
    path: PathBuf,
}

impl FileGardenStore {
    pub fn new() -> Result<Self> {
        AppDirs::garden_path()
            .map(|path| Self { path })
            .ok_or(Error::NoDataDir)
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

impl GardenStore for FileGardenStore {
    fn load(&self) -> Option<GardenState> {
        let bytes = fs::read(&self.path).ok()?;
        parse(&bytes)
    }

    fn save(&self, state: &GardenState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(state)?;
        fs::write(&self.path, data)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// In-memory store for tests and throwaway runs. Clones share one blob.
#[derive(Debug, Clone, Default)]
pub struct MemoryGardenStore {
    raw: Rc<RefCell<Option<Vec<u8>>>>,
}

impl MemoryGardenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the stored bytes verbatim.
    pub fn set_raw(&self, bytes: &[u8]) {
        *self.raw.borrow_mut() = Some(bytes.to_vec());
    }
}

impl GardenStore for MemoryGardenStore {
    fn load(&self) -> Option<GardenState> {
        self.raw.borrow().as_deref().and_then(parse)
    }

    fn save(&self, state: &GardenState) -> Result<()> {
        *self.raw.borrow_mut() = Some(serde_json::to_vec(state)?);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.raw.borrow_mut() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    fn run(words: u32) -> RunResult {
        RunResult {
            finished_at: Utc::now(),
            wpm: 40,
            accuracy: 97,
            words,
            sol_earned: 5,
            duration_ms: 10_000,
        }
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempdir().unwrap();
        let store = FileGardenStore::with_path(dir.path().join("nested").join("garden.json"));
        assert!(store.load().is_none());

        let state = GardenState {
            lifetime_sol: 42,
            ..GardenState::default()
        }
        .add_run(run(12))
        .set_seed(Seed::Data);
        store.save(&state).unwrap();
        assert_eq!(store.load(), Some(state));
    }

    #[test]
    fn corrupt_file_loads_as_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("garden.json");
        fs::write(&path, b"{not json").unwrap();
        let store = FileGardenStore::with_path(&path);
        assert!(store.load().is_none());
        let updated = store.update(&|g| g.advance_tutorial()).unwrap();
        assert_eq!(updated.tutorial_beat, 1);
    }

    #[test]
    fn clear_removes_file() {
        let dir = tempdir().unwrap();
        let store = FileGardenStore::with_path(dir.path().join("garden.json"));
        store.save(&GardenState::default()).unwrap();
        store.clear().unwrap();
        assert!(store.load().is_none());
        store.clear().unwrap();
    }

    #[test]
    fn memory_store_shares_between_clones() {
        let store = MemoryGardenStore::new();
        let other = store.clone();
        store
            .update(&|g| GardenState {
                lifetime_sol: 7,
                ..g
            })
            .unwrap();
        assert_eq!(other.load().map(|g| g.lifetime_sol), Some(7));
        other.set_raw(b"garbage");
        assert!(store.load().is_none());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let store = MemoryGardenStore::new();
        store.set_raw(br#"{"lifetime_sol": 9}"#);
        let g = store.load().unwrap();
        assert_eq!(g.lifetime_sol, 9);
        assert!(g.run_history.is_empty());
    }

    #[test]
    fn add_run_counts_words() {
        let g = GardenState::default().add_run(run(10)).add_run(run(5));
        assert_eq!(g.total_words_typed, 15);
        assert_eq!(g.run_history.len(), 2);
        assert_eq!(g.recent_runs(1)[0].words, 5);
        assert_eq!(g.recent_runs(10).len(), 2);
    }

    #[test]
    fn unlock_and_toggle() {
        let g = GardenState::default()
            .toggle_upgrade("data.wpm")
            .unlock_upgrade("data.wpm")
            .unlock_upgrade("data.wpm");
        assert_eq!(g.unlocked_upgrades, vec!["data.wpm"]);
        assert_eq!(g.active_upgrades, vec!["data.wpm"]);
        let g = g.toggle_upgrade("data.wpm");
        assert!(g.active_upgrades.is_empty());
        let g = g.toggle_upgrade("data.wpm");
        assert_eq!(g.active_upgrades, vec!["data.wpm"]);
    }

    #[test]
    fn tutorial_caps_at_final_beat() {
        let mut g = GardenState::default();
        for _ in 0..5 {
            g = g.advance_tutorial();
        }
        assert_eq!(g.tutorial_beat, FINAL_TUTORIAL_BEAT);
        assert!(g.tutorial_complete);
    }

    #[test]
    fn advancing_never_reopens_the_walkthrough() {
        let g = GardenState {
            tutorial_complete: true,
            ..GardenState::default()
        }
        .advance_tutorial();
        assert_eq!(g.tutorial_beat, 1);
        assert!(g.tutorial_complete);
    }
}
