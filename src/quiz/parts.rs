use std::fs::File;
use std::path::Path;

use async_trait::async_trait;
use rand::prelude::*;
use rs_conllu::UPOS;

use crate::quiz::error::SourceError;
use crate::quiz::{self, QuestionSource};

static POSSIBLE_ANSWERS: [&str; 14] = [
    "прикметник",
    "прислівник",
    "вигук",
    "іменник",
    "власний іменник",
    "дієслово",
    "займенник",
    "прийменник",
    "сполучник",
    "підрядний сполучник",
    "допоміжне дієслово",
    "детермінатив",
    "числівник",
    "частка",
];

/// Ukrainian name of a part of speech. `None` for tags that are never
/// asked about (punctuation, symbols, unknown).
fn part_of_speech_name(upos: Option<&UPOS>) -> Option<&'static str> {
    let name = match upos? {
        UPOS::ADJ => "прикметник",
        UPOS::ADV => "прислівник",
        UPOS::INTJ => "вигук",
        UPOS::NOUN => "іменник",
        UPOS::PROPN => "власний іменник",
        UPOS::VERB => "дієслово",
        UPOS::PRON => "займенник",
        UPOS::ADP => "прийменник",
        UPOS::CCONJ => "сполучник",
        UPOS::SCONJ => "підрядний сполучник",
        UPOS::AUX => "допоміжне дієслово",
        UPOS::DET => "детермінатив",
        UPOS::NUM => "числівник",
        UPOS::PART => "частка",
        UPOS::X | UPOS::SYM | UPOS::PUNCT => return None,
    };
    Some(name)
}

/// Treebank sentences to ask about.
pub struct PartsSentences {
    pub sentences: Vec<PartsSentence>,
}

impl PartsSentences {
    /// Keeps only sentences that parsed, carry their original text and have
    /// at least one word to ask about.
    pub fn new(file: File) -> Self {
        let sentences = rs_conllu::parse_file(file)
            .filter_map(|sentence| sentence.ok())
            .filter_map(PartsSentence::new)
            .collect();
        Self { sentences }
    }

    pub fn load(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path).map_err(|e| SourceError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let doc = Self::new(file);
        if doc.sentences.is_empty() {
            return Err(SourceError::Empty {
                path: path.to_path_buf(),
            });
        }

        log::info!("Loaded {} sentences from {}", doc.sentences.len(), path.display());
        Ok(doc)
    }

    pub fn get_random_sentence(&self) -> Option<&PartsSentence> {
        self.sentences.choose(&mut rand::thread_rng())
    }
}

#[async_trait]
impl QuestionSource for PartsSentences {
    async fn request_next(&self) -> Result<Option<quiz::Question>, SourceError> {
        Ok(self
            .get_random_sentence()
            .map(|sentence| sentence.generate_question(&mut rand::thread_rng())))
    }
}

/// A sentence's text and the words in it that can be asked about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartsSentence {
    text: String,
    /// (form, part of speech)
    words: Vec<(String, &'static str)>,
}

impl PartsSentence {
    pub fn new(sentence: rs_conllu::Sentence) -> Option<Self> {
        let text = sentence
            .meta
            .iter()
            .find_map(|m| m.strip_prefix("text = "))?
            .to_string();
        let words = sentence
            .tokens
            .iter()
            .filter_map(|t| Some((t.form.to_string(), part_of_speech_name(t.upos.as_ref())?)))
            .collect::<Vec<_>>();
        Self::from_words(text, words)
    }

    pub fn from_words(text: String, words: Vec<(String, &'static str)>) -> Option<Self> {
        if words.is_empty() {
            return None;
        }
        Some(Self { text, words })
    }

    /// Marks a random word and asks whether it is a given part of speech:
    /// its real one or a wrong one, half the time each.
    pub fn generate_question(&self, rng: &mut impl Rng) -> quiz::Question {
        let (form, correct) = &self.words[rng.gen_range(0..self.words.len())];

        let asked = if rng.gen_bool(0.5) {
            correct
        } else {
            POSSIBLE_ANSWERS
                .iter()
                .filter(|a| *a != correct)
                .choose(rng)
                .unwrap_or(correct)
        };

        let marked = self
            .text
            .split(' ')
            .map(|word| {
                let bare = word.chars().filter(|c| c.is_alphanumeric()).collect::<String>();
                if bare == *form {
                    format!("[{}]", word)
                } else {
                    word.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ");

        let text = format!(
            "У реченні:\n\"{}\"\n\nСлово «{}» є частиною мови «{}»?",
            marked, form, asked
        );
        quiz::Question::new(text, asked == correct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;

    fn sentence() -> PartsSentence {
        PartsSentence::from_words(
            "Кіт спить.".to_string(),
            vec![("Кіт".to_string(), "іменник"), ("спить".to_string(), "дієслово")],
        )
        .unwrap()
    }

    #[test]
    fn names_skip_punctuation() {
        assert_eq!(part_of_speech_name(Some(&UPOS::NOUN)), Some("іменник"));
        assert_eq!(part_of_speech_name(Some(&UPOS::PUNCT)), None);
        assert_eq!(part_of_speech_name(None), None);
    }

    #[test]
    fn sentence_without_words_is_skipped() {
        assert!(PartsSentence::from_words("...".to_string(), Vec::new()).is_none());
    }

    #[test]
    fn answer_matches_asked_part() {
        let sentence = sentence();
        let mut rng = StdRng::seed_from_u64(3);
        let mut seen = (false, false);
        for _ in 0..40 {
            let question = sentence.generate_question(&mut rng);
            let claims_noun = question.text.contains("«Кіт» є частиною мови «іменник»");
            let claims_verb = question.text.contains("«спить» є частиною мови «дієслово»");
            assert_eq!(question.correct_answer, claims_noun || claims_verb);
            assert!(question.text.contains('[') && question.text.contains(']'));
            if question.correct_answer {
                seen.0 = true;
            } else {
                seen.1 = true;
            }
        }
        assert!(seen.0 && seen.1);
    }
}
