//! Applies typing commands to the session and fans them out to the golden,
//! green and fever systems.

use std::rc::Rc;

use tracing::{debug, trace};

use crate::events::{EventBus, GameEvent};
use crate::fever::FeverTracker;
use crate::golden::GoldenSystem;
use crate::green::GreenSystem;
use crate::scheduler::Clock;
use crate::session::{SessionOptions, TypingSession};
use crate::stats::SessionSummary;
use crate::words::{WordSource, WordSupply};

/// Endless runs top up once fewer untyped words than this remain
pub const ENDLESS_LOW_WATER: usize = 10;
pub const ENDLESS_BATCH: usize = 20;

pub struct TypingEngine {
    bus: Rc<EventBus>,
    clock: Rc<dyn Clock>,
    session: TypingSession,
    golden: GoldenSystem,
    green: GreenSystem,
    fever: FeverTracker,
    supply: Box<dyn WordSupply>,
    /// Mistaken words block the space bar
    strict: bool,
    /// Every correct letter counts as a capture, even outside a fever rush
    capture_all: bool,
}

impl std::fmt::Debug for TypingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypingEngine")
            .field("session", &self.session)
            .field("golden", &self.golden)
            .field("green", &self.green)
            .field("fever", &self.fever)
            .field("strict", &self.strict)
            .field("capture_all", &self.capture_all)
            .finish_non_exhaustive()
    }
}

impl TypingEngine {
    pub fn new(
        bus: Rc<EventBus>,
        clock: Rc<dyn Clock>,
        golden: GoldenSystem,
        green: GreenSystem,
        fever: FeverTracker,
        supply: Box<dyn WordSupply>,
    ) -> Self {
        Self {
            bus,
            clock,
            session: TypingSession::default(),
            golden,
            green,
            fever,
            supply,
            strict: false,
            capture_all: false,
        }
    }

    pub fn session(&self) -> &TypingSession {
        &self.session
    }

    pub fn golden(&self) -> &GoldenSystem {
        &self.golden
    }

    pub fn golden_mut(&mut self) -> &mut GoldenSystem {
        &mut self.golden
    }

    pub fn green(&self) -> &GreenSystem {
        &self.green
    }

    pub fn green_mut(&mut self) -> &mut GreenSystem {
        &mut self.green
    }

    pub fn fever(&self) -> &FeverTracker {
        &self.fever
    }

    pub fn fever_mut(&mut self) -> &mut FeverTracker {
        &mut self.fever
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    pub fn set_capture_all(&mut self, capture_all: bool) {
        self.capture_all = capture_all;
    }

    pub fn generate_words(&mut self, source: &WordSource) -> Vec<String> {
        self.supply.generate_words(source)
    }

    /// Replaces the session. Pending letters and their timers go with the old one.
    pub fn start(&mut self, words: Vec<String>, options: SessionOptions) {
        self.golden.reset();
        self.green.reset();
        self.session = TypingSession::new(words, options);
        debug!(mode = %options.mode, words = self.session.words().len(), "session started");

        self.bus.publish(GameEvent::SessionStarted { mode: options.mode });
        self.bus.publish(GameEvent::WordsChanged);
        self.refill();
    }

    fn in_fever(&self) -> bool {
        self.capture_all || self.fever.is_active()
    }

    pub fn type_character(&mut self, c: char) {
        if self.session.has_ended() {
            return;
        }
        // a deadline that passed between keys fires before this key can land on it
        self.poll_timers();
        let now = self.clock.now_ms();
        let pos = self.session.cursor();
        let Some(correct) = self.session.push_char(c, now) else {
            return;
        };
        trace!(?c, correct, ?pos, "keystroke");

        let fever = self.in_fever();
        if correct {
            if fever {
                self.golden.trigger_fever_capture(pos);
                self.fever.increment_chain();
            }
            if self.green.is_position(pos) {
                self.green.capture();
            }
            if self.golden.is_position(pos) {
                self.golden.capture();
            }
        } else {
            if fever {
                self.fever.break_chain();
            }
            if self.golden.is_position(pos) {
                self.golden.expire();
            }
            self.golden.on_typo(now);
            self.green.on_typo(now);
        }
        self.fever.track_keystroke(correct);

        self.bus.publish(GameEvent::Keystroke {
            key: c,
            correct,
            pos,
        });
        let speed = self.session.typing_speed(now);
        self.golden.on_character_typed(&self.session, now, speed);
    }

    /// Space: closes the current word and moves on.
    pub fn advance_word(&mut self) {
        if self.session.has_ended() {
            return;
        }
        self.poll_timers();
        let index = self.session.current_word_index;
        let Some(word) = self.session.word(index) else {
            return;
        };
        if word.typed.is_empty() {
            return;
        }

        let mistaken = word.is_incomplete() || word.has_mismatch();
        let already_mistaken = word.mistaken;
        let now = self.clock.now_ms();
        let mut completed = false;

        if mistaken {
            if self.strict {
                debug!(index, "strict mode holds the cursor on a mistaken word");
                return;
            }
            self.session.mark_mistaken(index);
            self.session.word_streak = 0;
            self.golden.expire();
        } else if !already_mistaken {
            self.session.word_streak += 1;
            self.session.words_completed += 1;
            completed = true;
            self.bus.publish(GameEvent::WordComplete { word_index: index });
        }

        self.session.advance_cursor();
        self.golden.check_passed(&self.session);
        self.green.check_passed(&self.session);
        self.refill();

        if completed {
            let speed = self.session.typing_speed(now);
            self.green.on_word_completed(&self.session, now, speed);
        }
        if self.session.is_exhausted() {
            self.complete();
        }
    }

    pub fn backspace(&mut self) -> bool {
        !self.session.has_ended() && self.session.backspace()
    }

    pub fn delete_word(&mut self) -> bool {
        !self.session.has_ended() && self.session.delete_word()
    }

    /// Ends the run and publishes its summary. Only the first call counts.
    pub fn complete(&mut self) -> Option<SessionSummary> {
        if self.session.has_ended() {
            return None;
        }
        self.session.ended_at = Some(self.clock.now_ms());
        self.golden.reset();
        self.green.reset();

        let summary = self.session.summary();
        debug!(wpm = summary.wpm, accuracy = summary.accuracy, "session ended");
        self.bus.publish(GameEvent::SessionEnded {
            summary: summary.clone(),
        });
        Some(summary)
    }

    /// Fires any due letter expiry. Returns true if something expired.
    pub fn poll_timers(&mut self) -> bool {
        let now = self.clock.now_ms();
        let golden = self.golden.poll(now);
        let green = self.green.poll(now);
        golden || green
    }

    /// Keeps the untyped buffer topped up.
    pub fn refill(&mut self) {
        let options = self.session.options();
        let appended = if options.is_tutorial() {
            self.session.feed_sentences()
        } else if self.session.remaining_words() < ENDLESS_LOW_WATER {
            let count = ENDLESS_BATCH.min(self.session.words_to_generate());
            if count == 0 {
                false
            } else {
                let words = self.supply.generate_words(&WordSource::Common { count });
                self.session.append_words(words) > 0
            }
        } else {
            false
        };

        if appended {
            self.bus.publish(GameEvent::WordsChanged);
        }
    }
}
