use std::collections::{BTreeMap, VecDeque};

use crate::stats::SessionSummary;
use crate::types::{LetterPos, SessionMode};

/// Gaps longer than this between keystrokes do not count as active time
pub const AFK_THRESHOLD_MS: u64 = 5_000;
/// Window for the rolling keystrokes-per-second measure
pub const SPEED_WINDOW_MS: u64 = 2_000;
/// Tutorial text is fed a sentence at a time once fewer words than this remain
pub const SENTENCE_LOW_WATER: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub mode: SessionMode,
    /// Total words in the run; `None` keeps appending filler forever
    pub word_limit: Option<usize>,
}

impl SessionOptions {
    pub fn tutorial() -> Self {
        Self {
            mode: SessionMode::Tutorial,
            word_limit: None,
        }
    }

    pub fn endless(word_limit: Option<usize>) -> Self {
        Self {
            mode: SessionMode::Endless,
            word_limit,
        }
    }

    pub fn is_tutorial(&self) -> bool {
        self.mode == SessionMode::Tutorial
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::endless(None)
    }
}

/// One word of the stream and what the player has typed for it
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WordEntry {
    pub target: String,
    pub typed: String,
    pub mistaken: bool,
}

impl WordEntry {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            typed: String::new(),
            mistaken: false,
        }
    }

    pub fn target_len(&self) -> usize {
        self.target.chars().count()
    }

    pub fn typed_len(&self) -> usize {
        self.typed.chars().count()
    }

    pub fn expected_at(&self, char_index: usize) -> Option<char> {
        self.target.chars().nth(char_index)
    }

    pub fn is_exact(&self) -> bool {
        self.typed == self.target
    }

    /// Any typed char that differs from the target, overflow included
    pub fn has_mismatch(&self) -> bool {
        let mut target = self.target.chars();
        self.typed.chars().any(|c| target.next() != Some(c))
    }

    pub fn is_incomplete(&self) -> bool {
        self.typed_len() < self.target_len()
    }

    /// A cleanly finished word that backward navigation may not reopen
    pub fn is_checkpoint(&self) -> bool {
        !self.mistaken && self.is_exact()
    }
}

/// Mutable state of one run
#[derive(Debug, Clone)]
pub struct TypingSession {
    words: Vec<WordEntry>,
    pending_sentences: VecDeque<Vec<String>>,
    options: SessionOptions,
    pub current_word_index: usize,
    pub current_char_index: usize,
    pub correct_keystrokes: u64,
    pub incorrect_keystrokes: u64,
    pub started_at: Option<u64>,
    pub ended_at: Option<u64>,
    pub active_time_ms: u64,
    last_keystroke_at: Option<u64>,
    recent_keystrokes: VecDeque<u64>,
    /// Consecutive words completed without a mistake
    pub word_streak: u32,
    pub words_completed: u32,
    /// Expected chars the player got wrong, by count
    misses: BTreeMap<char, u32>,
}

impl Default for TypingSession {
    fn default() -> Self {
        Self::new(Vec::new(), SessionOptions::default())
    }
}

impl TypingSession {
    pub fn new(words: Vec<String>, options: SessionOptions) -> Self {
        let mut session = Self {
            words: Vec::new(),
            pending_sentences: VecDeque::new(),
            options,
            current_word_index: 0,
            current_char_index: 0,
            correct_keystrokes: 0,
            incorrect_keystrokes: 0,
            started_at: None,
            ended_at: None,
            active_time_ms: 0,
            last_keystroke_at: None,
            recent_keystrokes: VecDeque::new(),
            word_streak: 0,
            words_completed: 0,
            misses: BTreeMap::new(),
        };

        if options.is_tutorial() {
            session.pending_sentences = split_sentences(words).into();
            session.feed_sentences();
        } else {
            session.append_words(words);
        }
        session
    }

    pub fn options(&self) -> SessionOptions {
        self.options
    }

    pub fn words(&self) -> &[WordEntry] {
        &self.words
    }

    pub fn word(&self, index: usize) -> Option<&WordEntry> {
        self.words.get(index)
    }

    /// Target text, or "" past the end of the buffer
    pub fn target(&self, index: usize) -> &str {
        self.words.get(index).map_or("", |w| w.target.as_str())
    }

    /// Typed text, or "" past the end of the buffer
    pub fn typed(&self, index: usize) -> &str {
        self.words.get(index).map_or("", |w| w.typed.as_str())
    }

    pub fn is_mistaken(&self, index: usize) -> bool {
        self.words.get(index).is_some_and(|w| w.mistaken)
    }

    pub fn cursor(&self) -> LetterPos {
        LetterPos::new(self.current_word_index, self.current_char_index)
    }

    pub fn has_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn has_ended(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Untyped words from the cursor on
    pub fn remaining_words(&self) -> usize {
        self.words.len().saturating_sub(self.current_word_index)
    }

    pub fn has_pending_sentences(&self) -> bool {
        !self.pending_sentences.is_empty()
    }

    /// Cursor has moved past the last word and nothing more will arrive.
    pub fn is_exhausted(&self) -> bool {
        self.current_word_index >= self.words.len()
            && self.pending_sentences.is_empty()
            && self.words_to_generate() == 0
    }

    /// How many more filler words this run may still receive
    pub fn words_to_generate(&self) -> usize {
        if self.options.is_tutorial() {
            return 0;
        }
        match self.options.word_limit {
            Some(limit) => limit.saturating_sub(self.words.len()),
            None => usize::MAX,
        }
    }

    pub fn append_words(&mut self, words: Vec<String>) -> usize {
        let allowed = if self.options.is_tutorial() {
            words.len()
        } else {
            self.words_to_generate().min(words.len())
        };
        self.words
            .extend(words.into_iter().take(allowed).map(WordEntry::new));
        allowed
    }

    /// Appends queued sentences until the untyped buffer is comfortable.
    /// Returns true if anything was appended.
    pub fn feed_sentences(&mut self) -> bool {
        let mut appended = false;
        while self.remaining_words() < SENTENCE_LOW_WATER {
            match self.pending_sentences.pop_front() {
                Some(sentence) => {
                    self.words.extend(sentence.into_iter().map(WordEntry::new));
                    appended = true;
                }
                None => break,
            }
        }
        appended
    }

    /// Index of `pos` in the stream with one space between words.
    pub fn absolute_index(&self, pos: LetterPos) -> usize {
        let before: usize = self
            .words
            .iter()
            .take(pos.word_index)
            .map(|w| w.target_len() + 1)
            .sum();
        // words not yet in the buffer count as empty
        let missing = pos.word_index.saturating_sub(self.words.len());
        before + missing + pos.char_index
    }

    /// Inverse of [`absolute_index`](Self::absolute_index); `None` when the
    /// index falls on a space or beyond the buffer.
    pub fn position_at(&self, absolute: usize) -> Option<LetterPos> {
        let mut remaining = absolute;
        for (word_index, word) in self.words.iter().enumerate() {
            let len = word.target_len();
            if remaining < len {
                return Some(LetterPos::new(word_index, remaining));
            }
            remaining = remaining.checked_sub(len + 1)?;
        }
        None
    }

    /// Appends `c` to the current word and records the keystroke.
    /// Returns whether it matched the expected char, or `None` when the cursor
    /// is past the end of the buffer.
    pub fn push_char(&mut self, c: char, now_ms: u64) -> Option<bool> {
        let index = self.current_word_index;
        let word = self.words.get_mut(index)?;
        let expected = word.expected_at(word.typed_len());
        word.typed.push(c);
        self.current_char_index = word.typed_len();

        let correct = expected == Some(c);
        if correct {
            self.correct_keystrokes += 1;
        } else {
            self.incorrect_keystrokes += 1;
            if let Some(expected) = expected {
                *self.misses.entry(expected).or_default() += 1;
            }
        }
        self.record_timing(now_ms);
        Some(correct)
    }

    fn record_timing(&mut self, now_ms: u64) {
        if self.started_at.is_none() {
            self.started_at = Some(now_ms);
        }
        if let Some(last) = self.last_keystroke_at {
            let gap = now_ms.saturating_sub(last);
            if gap < AFK_THRESHOLD_MS {
                self.active_time_ms += gap;
            }
        }
        self.last_keystroke_at = Some(now_ms);

        self.recent_keystrokes.push_back(now_ms);
        self.trim_recent(now_ms);
    }

    fn trim_recent(&mut self, now_ms: u64) {
        while let Some(&front) = self.recent_keystrokes.front() {
            if now_ms.saturating_sub(front) > SPEED_WINDOW_MS {
                self.recent_keystrokes.pop_front();
            } else {
                break;
            }
        }
    }

    /// Rolling keystrokes per second over the last [`SPEED_WINDOW_MS`]
    pub fn typing_speed(&self, now_ms: u64) -> f64 {
        let recent = self
            .recent_keystrokes
            .iter()
            .filter(|&&t| now_ms.saturating_sub(t) <= SPEED_WINDOW_MS)
            .count();
        recent as f64 / (SPEED_WINDOW_MS as f64 / 1000.0)
    }

    /// Removes the last char of the current word, or steps back into the
    /// previous word when the checkpoint rule allows it.
    pub fn backspace(&mut self) -> bool {
        let index = self.current_word_index;
        if let Some(word) = self.words.get_mut(index) {
            if word.typed.pop().is_some() {
                word.mistaken = false;
                self.current_char_index = word.typed_len();
                return true;
            }
        }
        self.step_back(false)
    }

    /// Clears the current word, or steps back into the previous word and
    /// clears it when the checkpoint rule allows it.
    pub fn delete_word(&mut self) -> bool {
        let index = self.current_word_index;
        if let Some(word) = self.words.get_mut(index) {
            if !word.typed.is_empty() {
                word.typed.clear();
                word.mistaken = false;
                self.current_char_index = 0;
                return true;
            }
        }
        self.step_back(true)
    }

    fn step_back(&mut self, clear: bool) -> bool {
        let Some(prev_index) = self.current_word_index.checked_sub(1) else {
            return false;
        };
        let Some(prev) = self.words.get_mut(prev_index) else {
            return false;
        };
        if prev.is_checkpoint() {
            return false;
        }
        if clear {
            prev.typed.clear();
        }
        prev.mistaken = false;
        self.current_word_index = prev_index;
        self.current_char_index = prev.typed_len();
        true
    }

    pub fn mark_mistaken(&mut self, index: usize) {
        if let Some(word) = self.words.get_mut(index) {
            word.mistaken = true;
        }
    }

    pub fn advance_cursor(&mut self) {
        self.current_word_index += 1;
        self.current_char_index = self.typed(self.current_word_index).chars().count();
    }

    /// The `n` most missed chars, worst first
    pub fn top_misses(&self, n: usize) -> Vec<(char, u32)> {
        let mut misses: Vec<(char, u32)> =
            self.misses.iter().map(|(&c, &count)| (c, count)).collect();
        misses.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        misses.truncate(n);
        misses
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary::from_session(self)
    }
}

/// Groups words into sentences ending in `.`, `!` or `?`.
pub fn split_sentences(words: Vec<String>) -> Vec<Vec<String>> {
    let mut sentences = Vec::new();
    let mut current = Vec::new();
    for word in words {
        let ends = word.ends_with(['.', '!', '?']);
        current.push(word);
        if ends {
            sentences.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        sentences.push(current);
    }
    sentences
}
