use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or producing questions.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to read question data '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse question data '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Question data '{path}' contains no usable entries")]
    Empty { path: PathBuf },

    #[error("Failed to fetch question: {message}")]
    Fetch { message: String },
}

/// Errors raised by a statistics store.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("Failed to read statistics '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write statistics '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse statistics '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode statistics: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Statistics store unavailable: {message}")]
    Unavailable { message: String },
}

/// Why a round stopped before reaching its last question.
#[derive(Debug, Error)]
pub enum RoundError {
    #[error("Question source failed after {answered} of {total} questions: {source}")]
    SourceFailure {
        answered: usize,
        total: usize,
        #[source]
        source: SourceError,
    },

    #[error("Question source ran out after {answered} of {total} questions")]
    SourceDrained { answered: usize, total: usize },
}
