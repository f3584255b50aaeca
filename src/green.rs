//! Green rare letters. The walkthrough pins one to a fixed spot; endless runs
//! roll for one after enough clean words.

use std::rc::Rc;

use rand::rngs::StdRng;
use rand::Rng;
use tracing::debug;

use crate::events::{EventBus, GameEvent};
use crate::golden::{fade_for_speed, shortened_fade, EXPIRY_GRACE_MS, MISTAKE_COOLDOWN_MS};
use crate::scheduler::DelayedTask;
use crate::session::TypingSession;
use crate::types::LetterPos;

pub const DEFAULT_WORD_THRESHOLD: u32 = 40;
pub const DEFAULT_SPAWN_CHANCE: f64 = 0.35;
pub const DEFAULT_BASE_FADE_MS: u64 = 6_000;
pub const MIN_DISTANCE: usize = 5;
pub const MAX_DISTANCE: usize = 20;
/// Threshold reduction per streak word, and its cap
const STREAK_STEP: f64 = 0.05;
const STREAK_CAP: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GreenConfig {
    /// Random spawning; off while a fixed position is in use
    pub spawning: bool,
    pub word_threshold: u32,
    pub spawn_chance: f64,
    pub base_fade_ms: u64,
}

impl Default for GreenConfig {
    fn default() -> Self {
        Self {
            spawning: false,
            word_threshold: DEFAULT_WORD_THRESHOLD,
            spawn_chance: DEFAULT_SPAWN_CHANCE,
            base_fade_ms: DEFAULT_BASE_FADE_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RareLetter {
    pub pos: LetterPos,
    spawned_at: u64,
    /// `None` for pinned letters, which never fade
    fade_ms: Option<u64>,
    expiry: DelayedTask,
}

impl RareLetter {
    pub fn fade_ms(&self) -> Option<u64> {
        self.fade_ms
    }

    pub fn expires_at(&self) -> Option<u64> {
        self.expiry.due_at()
    }
}

/// Word threshold after the streak discount
pub fn effective_threshold(threshold: u32, streak: u32) -> f64 {
    let discount = (STREAK_STEP * streak as f64).min(STREAK_CAP);
    threshold as f64 * (1.0 - discount)
}

#[derive(Debug)]
pub struct GreenSystem {
    bus: Rc<EventBus>,
    rng: StdRng,
    config: GreenConfig,
    active: Option<RareLetter>,
    words_since_spawn: u32,
    last_mistake_at: Option<u64>,
}

impl GreenSystem {
    pub fn new(bus: Rc<EventBus>, rng: StdRng) -> Self {
        Self {
            bus,
            rng,
            config: GreenConfig::default(),
            active: None,
            words_since_spawn: 0,
            last_mistake_at: None,
        }
    }

    pub fn config(&self) -> GreenConfig {
        self.config
    }

    pub fn configure(&mut self, config: GreenConfig) {
        self.config = config;
    }

    pub fn active(&self) -> Option<&RareLetter> {
        self.active.as_ref()
    }

    pub fn is_position(&self, pos: LetterPos) -> bool {
        self.active.as_ref().is_some_and(|g| g.pos == pos)
    }

    /// Pins a letter that stays until captured or reset.
    pub fn set_position(&mut self, pos: LetterPos) {
        self.active = Some(RareLetter {
            pos,
            spawned_at: 0,
            fade_ms: None,
            expiry: DelayedTask::idle(),
        });
        self.bus.publish(GameEvent::GreenSpawned { pos });
    }

    pub fn reset(&mut self) {
        self.active = None;
        self.words_since_spawn = 0;
        self.last_mistake_at = None;
    }

    pub fn capture(&mut self) -> bool {
        let Some(letter) = self.active.take() else {
            return false;
        };
        debug!(pos = ?letter.pos, "green captured");
        self.bus.publish(GameEvent::GreenCaptured);
        true
    }

    pub fn expire(&mut self) -> bool {
        if self.active.take().is_none() {
            return false;
        }
        self.bus.publish(GameEvent::GreenExpired);
        true
    }

    /// Only fading letters react to typos; a pinned letter keeps waiting.
    pub fn on_typo(&mut self, now_ms: u64) {
        self.last_mistake_at = Some(now_ms);
        let Some(letter) = self.active.as_mut() else {
            return;
        };
        let Some(fade) = letter.fade_ms else {
            return;
        };
        let fade = shortened_fade(fade);
        letter.fade_ms = Some(fade);
        let elapsed = now_ms.saturating_sub(letter.spawned_at);
        let delay = fade.saturating_sub(elapsed) + EXPIRY_GRACE_MS;
        if letter
            .expiry
            .due_at()
            .map_or(true, |due| now_ms + delay < due)
        {
            letter.expiry.reschedule(now_ms, delay);
        }
    }

    /// Counts a clean word and rolls for a spawn once past the threshold.
    pub fn on_word_completed(
        &mut self,
        session: &TypingSession,
        now_ms: u64,
        keystrokes_per_sec: f64,
    ) -> Option<LetterPos> {
        if !self.config.spawning {
            return None;
        }
        self.words_since_spawn += 1;

        let threshold = effective_threshold(self.config.word_threshold, session.word_streak);
        if self.active.is_some() || (self.words_since_spawn as f64) < threshold {
            return None;
        }
        if self
            .last_mistake_at
            .is_some_and(|t| now_ms.saturating_sub(t) < MISTAKE_COOLDOWN_MS)
        {
            return None;
        }
        if !self.rng.gen_bool(self.config.spawn_chance.clamp(0.0, 1.0)) {
            return None;
        }

        let distance = self.rng.gen_range(MIN_DISTANCE..=MAX_DISTANCE);
        self.spawn_at_distance(session, distance, now_ms, keystrokes_per_sec)
    }

    pub fn spawn_at_distance(
        &mut self,
        session: &TypingSession,
        distance: usize,
        now_ms: u64,
        keystrokes_per_sec: f64,
    ) -> Option<LetterPos> {
        let target = session.absolute_index(session.cursor()) + distance;
        let pos = session.position_at(target)?;
        let fade = fade_for_speed(self.config.base_fade_ms, keystrokes_per_sec);

        self.words_since_spawn = 0;
        self.active = Some(RareLetter {
            pos,
            spawned_at: now_ms,
            fade_ms: Some(fade),
            expiry: DelayedTask::after(now_ms, fade + EXPIRY_GRACE_MS),
        });
        debug!(?pos, fade, "green spawned");
        self.bus.publish(GameEvent::GreenSpawned { pos });
        Some(pos)
    }

    /// A letter the cursor has moved beyond is dropped without an event.
    pub fn check_passed(&mut self, session: &TypingSession) -> bool {
        let passed = self.active.as_ref().is_some_and(|letter| {
            session.absolute_index(session.cursor()) > session.absolute_index(letter.pos)
        });
        if passed {
            self.active = None;
        }
        passed
    }

    pub fn poll(&mut self, now_ms: u64) -> bool {
        let due = self
            .active
            .as_mut()
            .is_some_and(|letter| letter.expiry.poll(now_ms));
        if due {
            self.expire();
        }
        due
    }
}
