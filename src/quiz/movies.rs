use std::fs;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::quiz::error::SourceError;
use crate::quiz::{self, QuestionSource};

/// Lowest and highest rating threshold asked about.
const THRESHOLDS: std::ops::RangeInclusive<u8> = 5..=9;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Movie {
    pub title: String,
    pub rating: f32,
    #[serde(default)]
    pub poster: Option<String>,
}

impl Movie {
    pub fn generate_question(&self, threshold: u8) -> quiz::Question {
        let text = format!(
            "«{}»\nРейтинг цього фільму більше ніж {}?",
            self.title, threshold
        );
        let question = quiz::Question::new(text, self.rating > f32::from(threshold));
        match &self.poster {
            Some(poster) => question.with_media(poster.clone()),
            None => question,
        }
    }
}

/// "Is the rating above N?" questions over a movie catalog.
///
/// Movies are dealt from a shuffled deck so a round doesn't repeat a movie
/// until the whole catalog has been shown.
pub struct MovieQuestions {
    movies: Vec<Movie>,
    deck: Mutex<Vec<usize>>,
}

impl MovieQuestions {
    pub fn new(movies: Vec<Movie>) -> Self {
        Self {
            movies,
            deck: Mutex::new(Vec::new()),
        }
    }

    /// Reads a JSON array of movies.
    pub fn load(path: &Path) -> Result<Self, SourceError> {
        let content = fs::read_to_string(path).map_err(|e| SourceError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let movies: Vec<Movie> = serde_json::from_str(&content).map_err(|e| SourceError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        if movies.is_empty() {
            return Err(SourceError::Empty {
                path: path.to_path_buf(),
            });
        }

        log::info!("Loaded {} movies from {}", movies.len(), path.display());
        Ok(Self::new(movies))
    }

    fn next_question(&self) -> Option<quiz::Question> {
        if self.movies.is_empty() {
            return None;
        }

        let mut rng = rand::thread_rng();
        let mut deck = self.deck.lock().unwrap_or_else(PoisonError::into_inner);
        if deck.is_empty() {
            deck.extend(0..self.movies.len());
            deck.shuffle(&mut rng);
        }
        let movie = &self.movies[deck.pop()?];
        Some(movie.generate_question(rng.gen_range(THRESHOLDS)))
    }
}

#[async_trait]
impl QuestionSource for MovieQuestions {
    async fn request_next(&self) -> Result<Option<quiz::Question>, SourceError> {
        Ok(self.next_question())
    }
}
