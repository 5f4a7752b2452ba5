use rand::seq::SliceRandom;
use rand::Rng;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use async_trait::async_trait;

use crate::quiz::error::SourceError;
use crate::quiz::{self, QuestionSource};

/// Combining acute accent placed right after the stressed vowel.
const STRESS_MARK: char = '\u{0301}';

// Голосні букви
const UKRAINIAN_VOWELS: [char; 10] = ['А', 'Е', 'Є', 'И', 'І', 'Ї', 'О', 'У', 'Ю', 'Я'];

fn is_vowel(c: char) -> bool {
    c.to_uppercase().any(|c| UKRAINIAN_VOWELS.contains(&c))
}

/// Dictionary of words with marked stress.
#[derive(Debug, Clone, Default)]
pub struct StressWords {
    pub words: Vec<StressWord>,
}

impl StressWords {
    /// One word per line. Lines that can't be asked about (phrases, fewer
    /// than two vowels, no stress mark) are skipped.
    pub fn new(reader: impl BufRead) -> std::io::Result<Self> {
        let mut words = Vec::new();
        for line in reader.lines() {
            if let Some(word) = StressWord::parse(&line?) {
                words.push(word);
            }
        }
        Ok(Self { words })
    }

    pub fn load(path: &Path) -> Result<Self, SourceError> {
        let read_err = |e| SourceError::Read {
            path: path.to_path_buf(),
            source: e,
        };
        let file = File::open(path).map_err(read_err)?;
        let dictionary = Self::new(BufReader::new(file)).map_err(read_err)?;
        if dictionary.words.is_empty() {
            return Err(SourceError::Empty {
                path: path.to_path_buf(),
            });
        }

        log::info!("Loaded {} stressed words from {}", dictionary.words.len(), path.display());
        Ok(dictionary)
    }

    pub fn get_random_word(&self) -> Option<&StressWord> {
        self.words.choose(&mut rand::thread_rng())
    }
}

#[async_trait]
impl QuestionSource for StressWords {
    async fn request_next(&self) -> Result<Option<quiz::Question>, SourceError> {
        Ok(self
            .get_random_word()
            .map(|word| word.generate_question(&mut rand::thread_rng())))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StressWord {
    letters: Vec<char>,
    /// Positions in `letters` of the stressed vowels.
    stressed: Vec<usize>,
}

impl StressWord {
    pub fn parse(line: &str) -> Option<Self> {
        let mut letters = Vec::new();
        let mut stressed = Vec::new();
        for c in line.trim().chars() {
            if c == STRESS_MARK {
                stressed.push(letters.len().checked_sub(1)?);
            } else {
                letters.push(c);
            }
        }

        // At least 2 vowels are needed to put the stress on the wrong one.
        let vowels = letters.iter().filter(|c| is_vowel(**c)).count();
        if stressed.is_empty() || vowels < 2 || letters.contains(&' ') {
            return None;
        }
        Some(Self { letters, stressed })
    }

    pub fn plain(&self) -> String {
        self.letters.iter().collect()
    }

    pub fn with_correct_stress(&self) -> String {
        self.render(&self.stressed)
    }

    /// The word stressed on a vowel that isn't the right one.
    pub fn with_wrong_stress(&self, rng: &mut impl Rng) -> Option<String> {
        let candidates = self
            .letters
            .iter()
            .enumerate()
            .filter(|(i, c)| is_vowel(**c) && !self.stressed.contains(i))
            .map(|(i, _)| i)
            .collect::<Vec<_>>();
        let position = *candidates.choose(rng)?;
        Some(self.render(&[position]))
    }

    fn render(&self, stressed: &[usize]) -> String {
        let mut word = String::with_capacity(self.letters.len() * 2 + stressed.len());
        for (i, c) in self.letters.iter().enumerate() {
            word.push(*c);
            if stressed.contains(&i) {
                word.push(STRESS_MARK);
            }
        }
        word
    }

    /// Shows the word with either the right or a wrong stress, half the time
    /// each, and asks whether it is right.
    pub fn generate_question(&self, rng: &mut impl Rng) -> quiz::Question {
        let shown_wrong = if rng.gen_bool(0.5) {
            self.with_wrong_stress(rng)
        } else {
            None
        };
        let correct_answer = shown_wrong.is_none();
        let shown = shown_wrong.unwrap_or_else(|| self.with_correct_stress());

        quiz::Question::new(
            format!("Чи правильно наголошено слово «{}»?", shown),
            correct_answer,
        )
    }
}
