use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::TypingSession;
use crate::types::SessionMode;

/// Snapshot published with `SessionEnded`
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub mode: SessionMode,
    pub words_typed: usize,
    pub words_completed: u32,
    pub correct_keystrokes: u64,
    pub incorrect_keystrokes: u64,
    pub duration_ms: u64,
    pub active_time_ms: u64,
    pub wpm: u32,
    pub accuracy: u32,
}

impl SessionSummary {
    pub fn from_session(session: &TypingSession) -> Self {
        let duration_ms = match (session.started_at, session.ended_at) {
            (Some(start), Some(end)) => end.saturating_sub(start),
            _ => 0,
        };
        Self {
            mode: session.options().mode,
            words_typed: session
                .words()
                .iter()
                .filter(|w| !w.typed.is_empty())
                .count(),
            words_completed: session.words_completed,
            correct_keystrokes: session.correct_keystrokes,
            incorrect_keystrokes: session.incorrect_keystrokes,
            duration_ms,
            active_time_ms: session.active_time_ms,
            wpm: calculate_wpm(session),
            accuracy: calculate_accuracy(session),
        }
    }
}

/// Typed characters (spaces included) per five, over elapsed minutes.
/// Zero until the session has both started and ended.
pub fn calculate_wpm(session: &TypingSession) -> u32 {
    let (Some(start), Some(end)) = (session.started_at, session.ended_at) else {
        return 0;
    };
    let minutes = end.saturating_sub(start) as f64 / 60_000.0;
    if minutes <= 0.0 {
        return 0;
    }

    let typed: Vec<&str> = session
        .words()
        .iter()
        .map(|w| w.typed.as_str())
        .take_while(|t| !t.is_empty())
        .collect();
    let spaces = typed.len().saturating_sub(1);
    let chars = typed.iter().map(|t| t.chars().count()).sum::<usize>() + spaces;

    ((chars as f64 / 5.0) / minutes).round() as u32
}

/// Percentage of typed characters that match their target, 100 when nothing
/// has been typed. Always within 0..=100.
pub fn calculate_accuracy(session: &TypingSession) -> u32 {
    let mut correct = 0u64;
    let mut total = 0u64;
    for word in session.words() {
        let mut target = word.target.chars();
        for c in word.typed.chars() {
            total += 1;
            if target.next() == Some(c) {
                correct += 1;
            }
        }
    }
    accuracy_percent(correct, total - correct)
}

pub fn accuracy_percent(correct: u64, incorrect: u64) -> u32 {
    let total = correct + incorrect;
    if total == 0 {
        return 100;
    }
    ((correct as f64 / total as f64) * 100.0).round() as u32
}

/// One finished run as kept in the garden history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub finished_at: DateTime<Utc>,
    pub wpm: u32,
    pub accuracy: u32,
    pub words: u32,
    pub sol_earned: u64,
    pub duration_ms: u64,
}

impl RunResult {
    pub fn new(summary: &SessionSummary, sol_earned: u64, finished_at: DateTime<Utc>) -> Self {
        Self {
            finished_at,
            wpm: summary.wpm,
            accuracy: summary.accuracy,
            words: summary.words_completed,
            sol_earned,
            duration_ms: summary.duration_ms,
        }
    }
}
