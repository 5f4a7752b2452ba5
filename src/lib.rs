//! Yes/no quiz rounds with persistent statistics.
//!
//! A round asks a fixed number of questions from a [`QuestionSource`],
//! scores each answer, pauses for feedback, and when the last answer is in
//! saves a [`RoundRecord`] to a [`StatisticsStore`]. [`RoundEngine`] runs the
//! round and reports to a [`RoundObserver`]; [`build_summary`] turns the
//! result into the figures shown to the player.

pub mod config;
pub mod quiz;

pub use crate::config::{Config, ConfigError};
pub use crate::quiz::engine::{RoundEngine, RoundObserver, RoundSettings, RoundStatistics};
pub use crate::quiz::error::{RoundError, SourceError, StatsError};
pub use crate::quiz::report::{build_summary, Summary};
pub use crate::quiz::round::{AnswerVerdict, Phase, RoundState};
pub use crate::quiz::stats::{
    JsonFileStatistics, MemoryStatistics, RoundRecord, StatisticsAggregate, StatisticsStore,
};
pub use crate::quiz::{Question, QuestionSource};
