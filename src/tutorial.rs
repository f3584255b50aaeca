//! The first-run walkthrough: intro text, golden/green mechanics, a fever
//! rush and a stats screen, in that order.

use std::rc::Rc;

use serde::{Deserialize, Serialize};
use strum_macros::Display;
use tracing::debug;

use crate::events::{EventBus, GameEvent};
use crate::fever::FeverTracker;
use crate::golden::DEFAULT_SPAWN_INTERVAL;
use crate::types::LetterPos;

pub const INTRO_TEXT: &str = "welcome to glint, a game that grows the more you type. \
every word you finish feeds your garden.";

pub const MECHANICS_TEXT: &str = "every correct word you type gains you more sol. \
think of it as sunlight for your garden. \
you are free to make any mistakes, as long as you keep moving forward. \
over time you will notice golden letters appear as you type. \
catch them in time to gain a sol burst. \
stay in flow and you will catch more golden letters. \
sometimes, rarer characters appear that are different from the usual golden letter. \
type them to trigger something special!";

pub const FEVER_TEXT: &str = "welcome to fever mode. every letter is golden now, \
so go fast and collect everything you can. \
one wrong key and your chain breaks, so stay sharp. \
keep the rhythm going and watch the chain climb. \
almost there, finish strong and see how you did.";

/// Golden letters start appearing from this sentence of the mechanics text
const MECHANICS_GOLDEN_SENTENCE: usize = 4;
const FEVER_SPAWN_INTERVAL: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Intro,
    Mechanics,
    Fever,
    Stats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Transition {
    Start,
    PhaseComplete,
    GreenCaptured,
    StatsDismissed,
    Reset,
}

/// Everything a phase needs from the rest of the game
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseConfig {
    pub words: Vec<String>,
    pub golden_enabled: bool,
    pub golden_spawn_interval: usize,
    pub golden_start_word_index: usize,
    pub green_position: Option<LetterPos>,
    pub sol_bar_visible: bool,
    pub all_letters_capturable: bool,
}

impl PhaseConfig {
    fn base() -> Self {
        Self {
            words: Vec::new(),
            golden_enabled: true,
            golden_spawn_interval: DEFAULT_SPAWN_INTERVAL,
            golden_start_word_index: 0,
            green_position: None,
            sol_bar_visible: true,
            all_letters_capturable: false,
        }
    }

    pub fn for_phase(phase: Phase) -> Self {
        match phase {
            Phase::Idle => Self::base(),
            Phase::Intro => Self {
                words: split_words(INTRO_TEXT),
                golden_enabled: false,
                sol_bar_visible: false,
                ..Self::base()
            },
            Phase::Mechanics => Self {
                words: split_words(MECHANICS_TEXT),
                golden_start_word_index: sentence_start(MECHANICS_TEXT, MECHANICS_GOLDEN_SENTENCE),
                green_position: first_char_position(MECHANICS_TEXT, '!'),
                ..Self::base()
            },
            Phase::Fever => Self {
                words: split_words(FEVER_TEXT),
                golden_spawn_interval: FEVER_SPAWN_INTERVAL,
                all_letters_capturable: true,
                ..Self::base()
            },
            Phase::Stats => Self {
                golden_enabled: false,
                ..Self::base()
            },
        }
    }
}

fn split_words(text: &str) -> Vec<String> {
    text.split(' ').map(String::from).collect()
}

/// Word index where the `n`th (1-based) sentence begins
pub fn sentence_start(text: &str, n: usize) -> usize {
    if n <= 1 {
        return 0;
    }
    let mut sentence = 1;
    for (index, word) in text.split(' ').enumerate() {
        if word.ends_with(['.', '!', '?']) {
            sentence += 1;
            if sentence == n {
                return index + 1;
            }
        }
    }
    0
}

pub fn first_char_position(text: &str, needle: char) -> Option<LetterPos> {
    text.split(' ').enumerate().find_map(|(word_index, word)| {
        word.chars()
            .position(|c| c == needle)
            .map(|char_index| LetterPos::new(word_index, char_index))
    })
}

/// Phase state machine. Entering intro resets fever, entering fever starts
/// it and leaving fever ends it.
#[derive(Debug)]
pub struct TutorialMachine {
    bus: Rc<EventBus>,
    phase: Phase,
    started_at: Option<u64>,
}

impl TutorialMachine {
    pub fn new(bus: Rc<EventBus>) -> Self {
        Self {
            bus,
            phase: Phase::Idle,
            started_at: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> PhaseConfig {
        PhaseConfig::for_phase(self.phase)
    }

    pub fn is_active(&self) -> bool {
        self.phase != Phase::Idle
    }

    fn next(&self, event: Transition) -> Option<Phase> {
        use Phase::*;
        use Transition::*;
        match (self.phase, event) {
            (Idle, Start) => Some(Intro),
            (Intro, PhaseComplete) => Some(Mechanics),
            (Mechanics, PhaseComplete | GreenCaptured) => Some(Fever),
            (Fever, PhaseComplete) => Some(Stats),
            (Stats, StatsDismissed) => Some(Idle),
            (Intro | Mechanics | Fever | Stats, Reset) => Some(Idle),
            _ => None,
        }
    }

    /// Applies `event`; false when the current phase does not accept it.
    pub fn send(&mut self, event: Transition, fever: &mut FeverTracker, now_ms: u64) -> bool {
        let Some(to) = self.next(event) else {
            debug!(phase = %self.phase, %event, "tutorial transition ignored");
            return false;
        };
        let from = self.phase;

        if from == Phase::Fever {
            fever.end(now_ms);
        }
        self.phase = to;
        match to {
            Phase::Intro => fever.reset(),
            Phase::Fever => fever.start(now_ms),
            _ => {}
        }

        debug!(%from, %to, "tutorial phase changed");
        self.bus.publish(GameEvent::PhaseChanged { from, to });
        true
    }

    pub fn start(&mut self, fever: &mut FeverTracker, now_ms: u64) -> bool {
        self.send(Transition::Start, fever, now_ms)
    }

    pub fn complete_phase(&mut self, fever: &mut FeverTracker, now_ms: u64) -> bool {
        self.send(Transition::PhaseComplete, fever, now_ms)
    }

    pub fn capture_green(&mut self, fever: &mut FeverTracker, now_ms: u64) -> bool {
        self.send(Transition::GreenCaptured, fever, now_ms)
    }

    pub fn dismiss_stats(&mut self, fever: &mut FeverTracker, now_ms: u64) -> bool {
        self.send(Transition::StatsDismissed, fever, now_ms)
    }

    pub fn reset(&mut self, fever: &mut FeverTracker, now_ms: u64) -> bool {
        self.started_at = None;
        self.send(Transition::Reset, fever, now_ms)
    }

    /// Starts the walkthrough clock; later calls keep the first stamp.
    pub fn start_timer(&mut self, now_ms: u64) {
        self.started_at.get_or_insert(now_ms);
    }

    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        self.started_at
            .map_or(0, |start| now_ms.saturating_sub(start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventKind, EventLog};
    use assert_matches::assert_matches;

    fn machine() -> (TutorialMachine, FeverTracker, EventLog) {
        let bus = EventBus::new();
        let log = EventLog::attach(&bus);
        (TutorialMachine::new(Rc::clone(&bus)), FeverTracker::new(bus), log)
    }

    #[test]
    fn full_walkthrough_returns_to_idle() {
        let (mut t, mut fever, log) = machine();
        assert!(t.start(&mut fever, 0));
        assert!(t.complete_phase(&mut fever, 10));
        assert!(t.capture_green(&mut fever, 20));
        assert!(fever.is_active());
        assert!(t.complete_phase(&mut fever, 30));
        assert!(!fever.is_active());
        assert!(t.dismiss_stats(&mut fever, 40));
        assert_eq!(t.phase(), Phase::Idle);

        let changes = log.of_kind(EventKind::PhaseChanged);
        assert_eq!(changes.len(), 5);
        assert_matches!(
            changes[0],
            GameEvent::PhaseChanged {
                from: Phase::Idle,
                to: Phase::Intro
            }
        );
        assert_eq!(log.count(EventKind::FeverStarted), 1);
        assert_eq!(log.count(EventKind::FeverEnded), 1);
    }

    #[test]
    fn unlisted_transitions_are_rejected() {
        let (mut t, mut fever, log) = machine();
        assert!(!t.complete_phase(&mut fever, 0));
        assert!(!t.reset(&mut fever, 0));
        assert!(!t.dismiss_stats(&mut fever, 0));
        t.start(&mut fever, 0);
        assert!(!t.capture_green(&mut fever, 0));
        assert!(!t.start(&mut fever, 0));
        assert_eq!(t.phase(), Phase::Intro);
        assert_eq!(log.count(EventKind::PhaseChanged), 1);
    }

    #[test]
    fn reset_from_every_active_phase() {
        for steps in 1..=4 {
            let (mut t, mut fever, _log) = machine();
            t.start(&mut fever, 0);
            for _ in 1..steps {
                t.complete_phase(&mut fever, 0);
            }
            assert!(t.is_active());
            assert!(t.reset(&mut fever, 0), "reset from {}", t.phase());
            assert_eq!(t.phase(), Phase::Idle);
            assert!(!fever.is_active());
        }
    }

    #[test]
    fn reset_during_fever_ends_the_rush() {
        let (mut t, mut fever, log) = machine();
        t.start(&mut fever, 0);
        t.complete_phase(&mut fever, 0);
        t.complete_phase(&mut fever, 0);
        assert_eq!(t.phase(), Phase::Fever);
        t.reset(&mut fever, 100);
        assert_eq!(log.count(EventKind::FeverEnded), 1);
    }

    #[test]
    fn timer_starts_once_and_reset_clears_it() {
        let (mut t, mut fever, _log) = machine();
        t.start(&mut fever, 0);
        assert_eq!(t.elapsed_ms(500), 0);
        t.start_timer(100);
        t.start_timer(300);
        assert_eq!(t.elapsed_ms(500), 400);
        t.reset(&mut fever, 600);
        assert_eq!(t.elapsed_ms(700), 0);
    }

    #[test]
    fn phase_configs() {
        let intro = PhaseConfig::for_phase(Phase::Intro);
        assert!(!intro.golden_enabled);
        assert!(!intro.sol_bar_visible);
        assert!(!intro.words.is_empty());

        let mechanics = PhaseConfig::for_phase(Phase::Mechanics);
        let green = mechanics.green_position.unwrap();
        let word = &mechanics.words[green.word_index];
        assert_eq!(word.chars().nth(green.char_index), Some('!'));
        assert!(mechanics.golden_start_word_index > 0);
        assert!(mechanics.words[mechanics.golden_start_word_index - 1].ends_with('.'));

        let fever = PhaseConfig::for_phase(Phase::Fever);
        assert!(fever.all_letters_capturable);
        assert_eq!(fever.golden_spawn_interval, 5);

        assert!(!PhaseConfig::for_phase(Phase::Stats).golden_enabled);
        assert!(PhaseConfig::for_phase(Phase::Idle).words.is_empty());
    }

    #[test]
    fn sentence_start_counts_terminators() {
        let text = "one. two three! four? five";
        assert_eq!(sentence_start(text, 1), 0);
        assert_eq!(sentence_start(text, 2), 1);
        assert_eq!(sentence_start(text, 4), 4);
        assert_eq!(sentence_start(text, 9), 0);
    }
}
