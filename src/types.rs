use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// A character slot in the word stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LetterPos {
    pub word_index: usize,
    pub char_index: usize,
}

impl LetterPos {
    pub fn new(word_index: usize, char_index: usize) -> Self {
        Self {
            word_index,
            char_index,
        }
    }
}

/// Sol value of a golden letter, fixed when it spawns
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RewardTier {
    One,
    Two,
    Three,
}

impl RewardTier {
    /// Farther targets are harder to reach in time, so they pay more.
    pub fn from_distance(distance: usize) -> Self {
        match distance {
            0..=5 => RewardTier::One,
            6..=10 => RewardTier::Two,
            _ => RewardTier::Three,
        }
    }

    pub fn value(self) -> u64 {
        match self {
            RewardTier::One => 1,
            RewardTier::Two => 2,
            RewardTier::Three => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SolSource {
    Base,
    Golden,
    Bonus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SessionMode {
    Tutorial,
    Endless,
}
