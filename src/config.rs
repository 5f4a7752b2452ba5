//! Settings read from the environment (and `.env`, loaded by the binary).

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::quiz::engine::RoundSettings;

pub const QUESTIONS_PER_ROUND: &str = "QUIZ_QUESTIONS_PER_ROUND";
pub const FEEDBACK_DELAY_MS: &str = "QUIZ_FEEDBACK_DELAY_MS";
pub const STATS_DIR: &str = "QUIZ_STATS_DIR";
pub const MOVIES_PATH: &str = "QUIZ_MOVIES_PATH";
pub const POSTERS_DIR: &str = "QUIZ_POSTERS_DIR";
pub const STRESS_PATH: &str = "QUIZ_STRESS_PATH";
pub const CONLLU_PATH: &str = "QUIZ_CONLLU_PATH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub round: RoundSettings,
    /// One statistics file per chat lives here.
    pub stats_dir: PathBuf,
    pub movies_path: PathBuf,
    pub posters_dir: PathBuf,
    /// Word-stress dictionary. The topic is off when unset.
    pub stress_path: Option<PathBuf>,
    /// CoNLL-U treebank. The topic is off when unset.
    pub conllu_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            round: RoundSettings::default(),
            stats_dir: PathBuf::from("stats"),
            movies_path: PathBuf::from("data/movies.json"),
            posters_dir: PathBuf::from("posters"),
            stress_path: None,
            conllu_path: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(value) = lookup(QUESTIONS_PER_ROUND) {
            let questions = parse_number(QUESTIONS_PER_ROUND, &value)?;
            if questions == 0 {
                return Err(ConfigError::Invalid {
                    key: QUESTIONS_PER_ROUND,
                    value,
                    reason: "a round needs at least one question".to_string(),
                });
            }
            config.round.questions_per_round = questions as usize;
        }
        if let Some(value) = lookup(FEEDBACK_DELAY_MS) {
            config.round.feedback_delay = Duration::from_millis(parse_number(FEEDBACK_DELAY_MS, &value)?);
        }
        if let Some(value) = lookup(STATS_DIR) {
            config.stats_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup(MOVIES_PATH) {
            config.movies_path = PathBuf::from(value);
        }
        if let Some(value) = lookup(POSTERS_DIR) {
            config.posters_dir = PathBuf::from(value);
        }
        config.stress_path = lookup(STRESS_PATH).filter(|v| !v.is_empty()).map(PathBuf::from);
        config.conllu_path = lookup(CONLLU_PATH).filter(|v| !v.is_empty()).map(PathBuf::from);

        Ok(config)
    }
}

fn parse_number(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}
