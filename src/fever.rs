use std::rc::Rc;

use tracing::debug;

use crate::events::{EventBus, GameEvent};
use crate::stats::accuracy_percent;

/// Counters for one fever rush
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeverStats {
    pub start_time: u64,
    pub golden_captures: u32,
    pub correct_keystrokes: u32,
    pub incorrect_keystrokes: u32,
    pub current_chain: u32,
    pub max_chain: u32,
    pub words_completed: u32,
}

/// What a finished rush reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeverSummary {
    pub stats: FeverStats,
    pub wpm: u32,
    pub accuracy: u32,
}

/// Tracks a fever rush. Every method is a no-op unless a rush is active.
#[derive(Debug)]
pub struct FeverTracker {
    bus: Rc<EventBus>,
    stats: Option<FeverStats>,
    /// Ends the rush after this many words; `None` leaves the ending to the caller
    word_limit: Option<u32>,
}

impl FeverTracker {
    pub fn new(bus: Rc<EventBus>) -> Self {
        Self {
            bus,
            stats: None,
            word_limit: None,
        }
    }

    pub fn start(&mut self, now_ms: u64) {
        self.start_with_limit(now_ms, None);
    }

    /// Starts a rush that reports completion after `word_limit` words.
    pub fn start_with_limit(&mut self, now_ms: u64, word_limit: Option<u32>) {
        self.stats = Some(FeverStats {
            start_time: now_ms,
            ..FeverStats::default()
        });
        self.word_limit = word_limit;
        debug!(?word_limit, "fever started");
        self.bus.publish(GameEvent::FeverStarted);
    }

    /// Finalises the rush and publishes its summary.
    pub fn end(&mut self, now_ms: u64) -> Option<FeverSummary> {
        let stats = self.stats.take()?;
        self.word_limit = None;

        let elapsed_ms = now_ms.saturating_sub(stats.start_time);
        let minutes = elapsed_ms as f64 / 60_000.0;
        let wpm = if minutes > 0.0 {
            ((stats.correct_keystrokes as f64 / 5.0) / minutes).round() as u32
        } else {
            0
        };
        let accuracy = accuracy_percent(
            stats.correct_keystrokes as u64,
            stats.incorrect_keystrokes as u64,
        );

        debug!(wpm, accuracy, max_chain = stats.max_chain, "fever ended");
        self.bus.publish(GameEvent::FeverEnded {
            stats,
            wpm,
            accuracy,
        });
        Some(FeverSummary {
            stats,
            wpm,
            accuracy,
        })
    }

    pub fn stats(&self) -> Option<&FeverStats> {
        self.stats.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.stats.is_some()
    }

    pub fn track_golden_capture(&mut self) {
        if let Some(stats) = self.stats.as_mut() {
            stats.golden_captures += 1;
        }
    }

    pub fn track_keystroke(&mut self, correct: bool) {
        if let Some(stats) = self.stats.as_mut() {
            if correct {
                stats.correct_keystrokes += 1;
            } else {
                stats.incorrect_keystrokes += 1;
            }
        }
    }

    /// Counts a completed word; true once the rush has reached its word limit.
    pub fn track_word_complete(&mut self) -> bool {
        match self.stats.as_mut() {
            Some(stats) => {
                stats.words_completed += 1;
                self.word_limit
                    .is_some_and(|limit| stats.words_completed >= limit)
            }
            None => false,
        }
    }

    pub fn increment_chain(&mut self) -> u32 {
        let Some(stats) = self.stats.as_mut() else {
            return 0;
        };
        stats.current_chain += 1;
        stats.max_chain = stats.max_chain.max(stats.current_chain);
        let (current, max) = (stats.current_chain, stats.max_chain);
        self.bus.publish(GameEvent::ChainUpdated { current, max });
        current
    }

    pub fn break_chain(&mut self) {
        let Some(stats) = self.stats.as_mut() else {
            return;
        };
        stats.current_chain = 0;
        let max = stats.max_chain;
        self.bus.publish(GameEvent::ChainUpdated { current: 0, max });
    }

    pub fn current_chain(&self) -> u32 {
        self.stats.map_or(0, |s| s.current_chain)
    }

    pub fn max_chain(&self) -> u32 {
        self.stats.map_or(0, |s| s.max_chain)
    }

    /// Drops any rush in progress without publishing a summary.
    pub fn reset(&mut self) {
        self.stats = None;
        self.word_limit = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventKind, EventLog};
    use assert_matches::assert_matches;

    fn tracker() -> (FeverTracker, EventLog) {
        let bus = EventBus::new();
        let log = EventLog::attach(&bus);
        (FeverTracker::new(bus), log)
    }

    #[test]
    fn inactive_tracker_ignores_everything() {
        let (mut fever, log) = tracker();
        fever.track_keystroke(true);
        fever.track_golden_capture();
        assert_eq!(fever.increment_chain(), 0);
        fever.break_chain();
        assert!(!fever.track_word_complete());
        assert!(fever.end(1000).is_none());
        assert!(log.events().is_empty());
    }

    #[test]
    fn chain_breaks_but_keeps_max() {
        let (mut fever, log) = tracker();
        fever.start(0);
        for _ in 0..3 {
            fever.increment_chain();
        }
        assert_eq!(fever.current_chain(), 3);
        fever.break_chain();
        assert_eq!(fever.current_chain(), 0);
        assert_eq!(fever.max_chain(), 3);
        assert_matches!(
            log.of_kind(EventKind::ChainUpdated).last(),
            Some(GameEvent::ChainUpdated { current: 0, max: 3 })
        );
    }

    #[test]
    fn max_chain_never_decreases() {
        let (mut fever, _log) = tracker();
        fever.start(0);
        let pattern = [true, true, false, true, true, true, false, false, true];
        let mut last_max = 0;
        for step in pattern {
            if step {
                fever.increment_chain();
            } else {
                fever.break_chain();
            }
            assert!(fever.max_chain() >= last_max);
            assert!(fever.max_chain() >= fever.current_chain());
            last_max = fever.max_chain();
        }
        assert_eq!(last_max, 3);
    }

    #[test]
    fn end_computes_wpm_and_accuracy() {
        let (mut fever, log) = tracker();
        fever.start(0);
        for _ in 0..50 {
            fever.track_keystroke(true);
        }
        for _ in 0..50 {
            fever.track_keystroke(false);
        }
        let summary = fever.end(60_000).unwrap();
        assert_eq!(summary.wpm, 10);
        assert_eq!(summary.accuracy, 50);
        assert!(!fever.is_active());
        assert_eq!(log.count(EventKind::FeverEnded), 1);
    }

    #[test]
    fn accuracy_is_full_without_keystrokes() {
        let (mut fever, _log) = tracker();
        fever.start(0);
        let summary = fever.end(0).unwrap();
        assert_eq!(summary.accuracy, 100);
        assert_eq!(summary.wpm, 0);
    }

    #[test]
    fn start_resets_previous_counters() {
        let (mut fever, log) = tracker();
        fever.start(0);
        fever.increment_chain();
        fever.track_golden_capture();
        fever.start(10);
        assert_eq!(fever.stats().unwrap().golden_captures, 0);
        assert_eq!(fever.max_chain(), 0);
        assert_eq!(log.count(EventKind::FeverStarted), 2);
    }

    #[test]
    fn word_limit_reports_completion() {
        let (mut fever, _log) = tracker();
        fever.start_with_limit(0, Some(2));
        assert!(!fever.track_word_complete());
        assert!(fever.track_word_complete());
    }
}
