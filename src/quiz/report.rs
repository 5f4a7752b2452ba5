//! End-of-round summary.

use chrono::{DateTime, Local};

use super::stats::{RoundRecord, StatisticsAggregate};

/// Format used for record dates, e.g. `19.10.26 14:05`.
pub const DATE_FORMAT: &str = "%d.%m.%y %H:%M";

/// Display-ready figures for the end-of-round message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    /// `correct/total` of the round that just ended.
    pub player_score: String,
    pub games_played: usize,
    /// `correct/total (date)` of the best game, or `-` with no history.
    pub best_record_display: String,
    /// Overall accuracy, whole percent.
    pub accuracy_display: String,
}

pub fn build_summary(record: &RoundRecord, aggregate: &StatisticsAggregate) -> Summary {
    let best_record_display = match &aggregate.best_record {
        Some(best) => format!("{} ({})", score(best), format_date(&best.date)),
        None => "-".to_string(),
    };

    Summary {
        player_score: score(record),
        games_played: aggregate.games_played,
        best_record_display,
        accuracy_display: format!("{}%", aggregate.total_accuracy.round() as i64),
    }
}

fn score(record: &RoundRecord) -> String {
    format!("{}/{}", record.correct, record.total)
}

pub fn format_date(date: &DateTime<Local>) -> String {
    date.format(DATE_FORMAT).to_string()
}
