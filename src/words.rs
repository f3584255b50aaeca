use include_dir::{include_dir, Dir};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Deserialize;

use crate::error::{Error, Result};

static LANG_DIR: Dir = include_dir!("src/lang");

pub const COMMON_LIST: &str = "common";

const TUTORIAL_BEATS: [&str; 3] = [
    "this is more than a typing test. every word you type plants a seed.",
    "what you choose shapes what grows here. type to move on. \
     choose to change. the garden keeps what you tend.",
    "you have typed enough to see how it works. the next choice sets your path. \
     cosmetic changes how it looks. mechanical changes how it plays. \
     data changes what it shows. choose with care, or choose freely. \
     either way, the garden grows.",
];

/// Where a batch of words comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WordSource {
    Common { count: usize },
    /// Story beat 1..=3; anything else yields no words
    Tutorial { beat: u8 },
    Custom(Vec<String>),
}

pub trait WordSupply {
    fn generate_words(&mut self, source: &WordSource) -> Vec<String>;
}

#[derive(Deserialize, Clone, Debug)]
pub struct WordList {
    pub name: String,
    pub size: u32,
    pub words: Vec<String>,
}

impl WordList {
    /// Loads an embedded `<name>.json` list.
    pub fn load(name: &str) -> Result<Self> {
        let file_name = format!("{name}.json");
        let contents = LANG_DIR
            .get_file(&file_name)
            .and_then(|file| file.contents_utf8())
            .ok_or_else(|| Error::WordListNotFound(file_name.clone()))?;
        Ok(serde_json::from_str(contents)?)
    }

    /// `count` shuffled words, cycling through the list if it is too short.
    pub fn sample(&self, rng: &mut StdRng, count: usize) -> Vec<String> {
        if self.words.is_empty() {
            return Vec::new();
        }
        let mut out = Vec::with_capacity(count);
        while out.len() < count {
            let wanted = (count - out.len()).min(self.words.len());
            out.extend(self.words.choose_multiple(rng, wanted).cloned());
        }
        out
    }
}

/// Default supply backed by the embedded common list
#[derive(Debug)]
pub struct WordGenerator {
    common: WordList,
    rng: StdRng,
}

impl WordGenerator {
    pub fn new(rng: StdRng) -> Result<Self> {
        Ok(Self {
            common: WordList::load(COMMON_LIST)?,
            rng,
        })
    }
}

impl WordSupply for WordGenerator {
    fn generate_words(&mut self, source: &WordSource) -> Vec<String> {
        match source {
            WordSource::Common { count } => self.common.sample(&mut self.rng, *count),
            WordSource::Tutorial { beat } => tutorial_beat(*beat),
            WordSource::Custom(words) => words.clone(),
        }
    }
}

pub fn tutorial_beat(beat: u8) -> Vec<String> {
    usize::from(beat)
        .checked_sub(1)
        .and_then(|i| TUTORIAL_BEATS.get(i))
        .map(|text| text.split_whitespace().map(String::from).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rand::SeedableRng;

    fn generator() -> WordGenerator {
        WordGenerator::new(StdRng::seed_from_u64(3)).unwrap()
    }

    #[test]
    fn common_list_is_embedded() {
        let list = WordList::load(COMMON_LIST).unwrap();
        assert_eq!(list.name, "common");
        assert_eq!(list.words.len(), list.size as usize);
        assert!(list.words.contains(&"the".to_string()));
    }

    #[test]
    fn missing_list_is_an_error() {
        assert_matches!(WordList::load("klingon"), Err(Error::WordListNotFound(_)));
    }

    #[test]
    fn common_words_come_from_the_list() {
        let mut gen = generator();
        let list = WordList::load(COMMON_LIST).unwrap();
        let words = gen.generate_words(&WordSource::Common { count: 25 });
        assert_eq!(words.len(), 25);
        assert!(words.iter().all(|w| list.words.contains(w)));
    }

    #[test]
    fn large_requests_cycle_the_list() {
        let mut gen = generator();
        let words = gen.generate_words(&WordSource::Common { count: 450 });
        assert_eq!(words.len(), 450);
    }

    #[test]
    fn same_seed_same_words() {
        let a = generator().generate_words(&WordSource::Common { count: 10 });
        let b = generator().generate_words(&WordSource::Common { count: 10 });
        assert_eq!(a, b);
    }

    #[test]
    fn tutorial_beats() {
        let mut gen = generator();
        let first = gen.generate_words(&WordSource::Tutorial { beat: 1 });
        assert_eq!(first.first().map(String::as_str), Some("this"));
        assert!(gen.generate_words(&WordSource::Tutorial { beat: 0 }).is_empty());
        assert!(gen.generate_words(&WordSource::Tutorial { beat: 4 }).is_empty());
    }

    #[test]
    fn custom_words_pass_through() {
        let mut gen = generator();
        let words = vec!["a".to_string(), "b".to_string()];
        assert_eq!(gen.generate_words(&WordSource::Custom(words.clone())), words);
    }
}
