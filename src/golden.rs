//! Golden reward letters.
//!
//! Every [`GoldenConfig::spawn_interval`] characters a golden letter may be
//! placed a few characters ahead of the cursor. Typing it correctly before it
//! fades pays sol by distance tier. A typo anywhere shortens the fade.

use std::rc::Rc;

use rand::rngs::StdRng;
use rand::Rng;
use tracing::debug;

use crate::events::{EventBus, GameEvent};
use crate::scheduler::DelayedTask;
use crate::session::TypingSession;
use crate::types::{LetterPos, RewardTier};

pub const DEFAULT_SPAWN_INTERVAL: usize = 20;
pub const MIN_DISTANCE: usize = 3;
pub const MAX_DISTANCE: usize = 15;
pub const MISTAKE_COOLDOWN_MS: u64 = 2_000;
pub const BASE_FADE_MS: u64 = 4_000;
pub const MIN_FADE_MS: u64 = 500;
/// Expiry fires this long after the visual fade ends
pub const EXPIRY_GRACE_MS: u64 = 50;

/// Fade shrinks as typing speeds up; the speed factor is clamped to 0.5..=2.
pub fn fade_for_speed(base_fade_ms: u64, keystrokes_per_sec: f64) -> u64 {
    let modifier = (keystrokes_per_sec / 5.0).clamp(0.5, 2.0);
    (base_fade_ms as f64 / modifier).round() as u64
}

/// Three quarters of `fade`, never below [`MIN_FADE_MS`]
pub fn shortened_fade(fade_ms: u64) -> u64 {
    (fade_ms * 3 / 4).max(MIN_FADE_MS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoldenConfig {
    pub enabled: bool,
    pub spawn_interval: usize,
    /// No spawns before the cursor reaches this word
    pub start_word_index: usize,
    pub base_fade_ms: u64,
}

impl Default for GoldenConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            spawn_interval: DEFAULT_SPAWN_INTERVAL,
            start_word_index: 0,
            base_fade_ms: BASE_FADE_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardLetter {
    pub pos: LetterPos,
    pub spawned_at: u64,
    pub reward: RewardTier,
    pub fade_ms: u64,
    expiry: DelayedTask,
}

impl RewardLetter {
    /// Fade left at `now_ms`
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.fade_ms
            .saturating_sub(now_ms.saturating_sub(self.spawned_at))
    }

    pub fn expires_at(&self) -> Option<u64> {
        self.expiry.due_at()
    }
}

#[derive(Debug)]
pub struct GoldenSystem {
    bus: Rc<EventBus>,
    rng: StdRng,
    config: GoldenConfig,
    active: Option<RewardLetter>,
    chars_since_spawn: usize,
    last_mistake_at: Option<u64>,
}

impl GoldenSystem {
    pub fn new(bus: Rc<EventBus>, rng: StdRng) -> Self {
        Self {
            bus,
            rng,
            config: GoldenConfig::default(),
            active: None,
            chars_since_spawn: 0,
            last_mistake_at: None,
        }
    }

    pub fn config(&self) -> GoldenConfig {
        self.config
    }

    pub fn configure(&mut self, config: GoldenConfig) {
        self.config = config;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }

    pub fn set_spawn_interval(&mut self, interval: usize) {
        self.config.spawn_interval = interval;
    }

    pub fn set_start_word_index(&mut self, index: usize) {
        self.config.start_word_index = index;
    }

    pub fn active(&self) -> Option<&RewardLetter> {
        self.active.as_ref()
    }

    pub fn is_position(&self, pos: LetterPos) -> bool {
        self.active.as_ref().is_some_and(|g| g.pos == pos)
    }

    /// Drops the instance and its timer, and clears spawn bookkeeping.
    /// Configuration is kept.
    pub fn reset(&mut self) {
        self.active = None;
        self.chars_since_spawn = 0;
        self.last_mistake_at = None;
    }

    fn in_cooldown(&self, now_ms: u64) -> bool {
        self.last_mistake_at
            .is_some_and(|t| now_ms.saturating_sub(t) < MISTAKE_COOLDOWN_MS)
    }

    /// Counts a typed char and spawns when every gate is open.
    pub fn on_character_typed(
        &mut self,
        session: &TypingSession,
        now_ms: u64,
        keystrokes_per_sec: f64,
    ) -> Option<LetterPos> {
        if !self.config.enabled || session.current_word_index < self.config.start_word_index {
            return None;
        }
        self.chars_since_spawn += 1;

        if self.active.is_some()
            || self.chars_since_spawn < self.config.spawn_interval
            || self.in_cooldown(now_ms)
        {
            return None;
        }

        let distance = self.rng.gen_range(MIN_DISTANCE..=MAX_DISTANCE);
        self.spawn_at_distance(session, distance, now_ms, keystrokes_per_sec)
    }

    /// Places a letter `distance` chars ahead of the cursor. Resets the spawn
    /// counter whether or not the target exists.
    pub fn spawn_at_distance(
        &mut self,
        session: &TypingSession,
        distance: usize,
        now_ms: u64,
        keystrokes_per_sec: f64,
    ) -> Option<LetterPos> {
        self.chars_since_spawn = 0;

        let target = session.absolute_index(session.cursor()) + distance;
        let Some(pos) = session.position_at(target) else {
            debug!(distance, "golden target beyond word list, skipped");
            return None;
        };

        let reward = RewardTier::from_distance(distance);
        let fade_ms = fade_for_speed(self.config.base_fade_ms, keystrokes_per_sec);
        self.active = Some(RewardLetter {
            pos,
            spawned_at: now_ms,
            reward,
            fade_ms,
            expiry: DelayedTask::after(now_ms, fade_ms + EXPIRY_GRACE_MS),
        });

        debug!(?pos, ?reward, fade_ms, "golden spawned");
        self.bus.publish(GameEvent::GoldenSpawned {
            pos,
            reward,
            fade_ms,
        });
        Some(pos)
    }

    /// Shortens the active fade and pushes back spawning for a while.
    pub fn on_typo(&mut self, now_ms: u64) {
        self.last_mistake_at = Some(now_ms);
        let Some(letter) = self.active.as_mut() else {
            return;
        };
        letter.fade_ms = shortened_fade(letter.fade_ms);
        let delay = letter.remaining_ms(now_ms) + EXPIRY_GRACE_MS;
        // an already overdue letter keeps its deadline
        if letter
            .expiry
            .due_at()
            .map_or(true, |due| now_ms + delay < due)
        {
            letter.expiry.reschedule(now_ms, delay);
        }
    }

    pub fn capture(&mut self) -> Option<RewardTier> {
        let letter = self.active.take()?;
        debug!(pos = ?letter.pos, reward = ?letter.reward, "golden captured");
        self.bus.publish(GameEvent::GoldenCaptured {
            reward: letter.reward,
            pos: letter.pos,
        });
        Some(letter.reward)
    }

    /// Removes the active letter and announces it.
    pub fn expire(&mut self) -> bool {
        if self.active.take().is_none() {
            return false;
        }
        self.bus.publish(GameEvent::GoldenExpired);
        true
    }

    /// Clears the letter without an event once the cursor is beyond it.
    pub fn check_passed(&mut self, session: &TypingSession) -> bool {
        let Some(letter) = self.active.as_ref() else {
            return false;
        };
        if session.absolute_index(session.cursor()) > session.absolute_index(letter.pos) {
            debug!(pos = ?letter.pos, "golden passed");
            self.active = None;
            return true;
        }
        false
    }

    /// In fever every correct letter counts as a tier one capture.
    pub fn trigger_fever_capture(&self, pos: LetterPos) {
        self.bus.publish(GameEvent::GoldenCaptured {
            reward: RewardTier::One,
            pos,
        });
    }

    /// Fires the expiry timer if due.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        let due = self
            .active
            .as_mut()
            .is_some_and(|letter| letter.expiry.poll(now_ms));
        if due {
            debug!("golden faded");
            self.expire();
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventKind, EventLog};
    use crate::session::SessionOptions;
    use assert_matches::assert_matches;
    use rand::SeedableRng;

    const TEXT: &str = "the quick brown fox jumps over the lazy dog again";

    fn setup() -> (GoldenSystem, TypingSession, EventLog) {
        let bus = EventBus::new();
        let log = EventLog::attach(&bus);
        let words = TEXT.split(' ').map(String::from).collect();
        let session = TypingSession::new(words, SessionOptions::endless(Some(10)));
        (
            GoldenSystem::new(bus, StdRng::seed_from_u64(7)),
            session,
            log,
        )
    }

    #[test]
    fn fade_scales_with_speed() {
        assert_eq!(fade_for_speed(4000, 0.0), 8000);
        assert_eq!(fade_for_speed(4000, 5.0), 4000);
        assert_eq!(fade_for_speed(4000, 10.0), 2000);
        assert_eq!(fade_for_speed(4000, 50.0), 2000);
    }

    #[test]
    fn shortened_fade_has_floor() {
        assert_eq!(shortened_fade(4000), 3000);
        assert_eq!(shortened_fade(600), MIN_FADE_MS);
    }

    #[test]
    fn spawn_at_distance_from_cursor() {
        let (mut golden, session, log) = setup();
        // "the quick": distance 4 lands on 'q'
        let pos = golden.spawn_at_distance(&session, 4, 0, 5.0).unwrap();
        assert_eq!(pos, LetterPos::new(1, 0));
        assert_eq!(golden.active().unwrap().reward, RewardTier::One);
        assert_matches!(
            log.of_kind(EventKind::GoldenSpawned)[..],
            [GameEvent::GoldenSpawned { fade_ms: 4000, .. }]
        );
    }

    #[test]
    fn spawn_beyond_buffer_is_skipped() {
        let (mut golden, mut session, log) = setup();
        session.current_word_index = 9;
        assert!(golden.spawn_at_distance(&session, 15, 0, 5.0).is_none());
        assert!(golden.active().is_none());
        assert_eq!(log.count(EventKind::GoldenSpawned), 0);
    }

    #[test]
    fn interval_gates_spawning() {
        let (mut golden, session, _log) = setup();
        golden.set_spawn_interval(3);
        assert!(golden.on_character_typed(&session, 0, 5.0).is_none());
        assert!(golden.on_character_typed(&session, 0, 5.0).is_none());
        assert!(golden.on_character_typed(&session, 0, 5.0).is_some());
        // one at a time
        for _ in 0..10 {
            assert!(golden.on_character_typed(&session, 0, 5.0).is_none());
        }
    }

    #[test]
    fn disabled_or_before_start_never_spawns() {
        let (mut golden, session, _log) = setup();
        golden.set_spawn_interval(1);
        golden.set_enabled(false);
        assert!(golden.on_character_typed(&session, 0, 5.0).is_none());
        golden.set_enabled(true);
        golden.set_start_word_index(2);
        assert!(golden.on_character_typed(&session, 0, 5.0).is_none());
    }

    #[test]
    fn mistake_cooldown_blocks_spawn() {
        let (mut golden, session, _log) = setup();
        golden.set_spawn_interval(1);
        golden.on_typo(1000);
        assert!(golden
            .on_character_typed(&session, 1000 + MISTAKE_COOLDOWN_MS - 1, 5.0)
            .is_none());
        assert!(golden
            .on_character_typed(&session, 1000 + MISTAKE_COOLDOWN_MS, 5.0)
            .is_some());
    }

    #[test]
    fn typo_shortens_and_reschedules() {
        let (mut golden, session, _log) = setup();
        golden.spawn_at_distance(&session, 5, 0, 5.0);
        golden.on_typo(1000);
        let letter = golden.active().unwrap();
        assert_eq!(letter.fade_ms, 3000);
        assert_eq!(letter.expires_at(), Some(3000 + EXPIRY_GRACE_MS));
    }

    #[test]
    fn typo_after_fade_elapsed_expires_promptly() {
        let (mut golden, session, log) = setup();
        golden.spawn_at_distance(&session, 5, 0, 5.0);
        golden.on_typo(3500);
        assert_eq!(golden.active().unwrap().expires_at(), Some(3550));
        assert!(golden.poll(3550));
        assert_eq!(log.count(EventKind::GoldenExpired), 1);
    }

    #[test]
    fn repeated_typos_never_extend_remaining_time() {
        let (mut golden, session, _log) = setup();
        golden.spawn_at_distance(&session, 5, 0, 5.0);
        let mut deadline = golden.active().unwrap().expires_at().unwrap();
        for now in [100, 200, 900, 1500, 1600] {
            golden.on_typo(now);
            let next = golden.active().unwrap().expires_at().unwrap();
            assert!(next <= deadline);
            deadline = next;
        }
    }

    #[test]
    fn expiry_fires_once() {
        let (mut golden, session, log) = setup();
        golden.spawn_at_distance(&session, 5, 0, 5.0);
        assert!(!golden.poll(4049));
        assert!(golden.poll(4050));
        assert!(!golden.poll(9000));
        assert_eq!(log.count(EventKind::GoldenExpired), 1);
    }

    #[test]
    fn capture_consumes_instance() {
        let (mut golden, session, log) = setup();
        golden.spawn_at_distance(&session, 12, 0, 5.0);
        assert_eq!(golden.capture(), Some(RewardTier::Three));
        assert_eq!(golden.capture(), None);
        assert!(!golden.poll(100_000));
        assert_eq!(log.count(EventKind::GoldenCaptured), 1);
        assert_eq!(log.count(EventKind::GoldenExpired), 0);
    }

    #[test]
    fn pass_clears_silently() {
        let (mut golden, mut session, log) = setup();
        let pos = golden.spawn_at_distance(&session, 4, 0, 5.0).unwrap();
        session.current_word_index = pos.word_index;
        session.current_char_index = pos.char_index;
        assert!(!golden.check_passed(&session));
        session.current_char_index += 1;
        assert!(golden.check_passed(&session));
        assert!(golden.active().is_none());
        assert_eq!(log.count(EventKind::GoldenExpired), 0);
    }

    #[test]
    fn fever_capture_is_tier_one() {
        let (golden, _session, log) = setup();
        golden.trigger_fever_capture(LetterPos::new(0, 1));
        assert_matches!(
            log.of_kind(EventKind::GoldenCaptured)[..],
            [GameEvent::GoldenCaptured {
                reward: RewardTier::One,
                ..
            }]
        );
    }
}
