//! Round history and the aggregates computed over it.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use tokio::sync::Mutex;

use super::error::StatsError;

/// Outcome of one finished round. Never changes once created.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RoundRecord {
    pub correct: usize,
    pub total: usize,
    pub date: DateTime<Local>,
}

impl RoundRecord {
    pub fn new(correct: usize, total: usize, date: DateTime<Local>) -> Self {
        Self {
            correct,
            total,
            date,
        }
    }

    /// Whether `self` beats `other` for the "best game" slot: more correct
    /// answers wins, and on a tie the earlier game keeps the slot.
    pub fn is_better_than(&self, other: &RoundRecord) -> bool {
        self.correct > other.correct || (self.correct == other.correct && self.date < other.date)
    }
}

/// Statistics derived from the full history. Computed, never stored.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatisticsAggregate {
    pub games_played: usize,
    pub best_record: Option<RoundRecord>,
    /// Percentage in `[0, 100]`.
    pub total_accuracy: f64,
}

impl StatisticsAggregate {
    pub fn from_history(history: &[RoundRecord]) -> Self {
        let best_record = history.iter().fold(None::<&RoundRecord>, |best, record| match best {
            Some(best) if !record.is_better_than(best) => Some(best),
            _ => Some(record),
        });

        let correct: usize = history.iter().map(|r| r.correct).sum();
        let total: usize = history.iter().map(|r| r.total).sum();
        let total_accuracy = if total == 0 {
            0.0
        } else {
            100.0 * correct as f64 / total as f64
        };

        Self {
            games_played: history.len(),
            best_record: best_record.cloned(),
            total_accuracy,
        }
    }
}

/// Persistent round history.
///
/// `record_round` must not return `Ok` before the record is durable, and
/// `current_aggregate` must see every record that was accepted.
#[async_trait]
pub trait StatisticsStore: Send + Sync {
    async fn record_round(&self, record: RoundRecord) -> Result<(), StatsError>;

    async fn current_aggregate(&self) -> Result<StatisticsAggregate, StatsError>;
}

/// History kept in process memory only.
#[derive(Debug, Default)]
pub struct MemoryStatistics {
    history: Mutex<Vec<RoundRecord>>,
}

impl MemoryStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(history: Vec<RoundRecord>) -> Self {
        Self {
            history: Mutex::new(history),
        }
    }

    pub async fn history(&self) -> Vec<RoundRecord> {
        self.history.lock().await.clone()
    }
}

#[async_trait]
impl StatisticsStore for MemoryStatistics {
    async fn record_round(&self, record: RoundRecord) -> Result<(), StatsError> {
        self.history.lock().await.push(record);
        Ok(())
    }

    async fn current_aggregate(&self) -> Result<StatisticsAggregate, StatsError> {
        Ok(StatisticsAggregate::from_history(&self.history.lock().await))
    }
}

#[derive(serde::Deserialize)]
struct HistoryFile {
    games: Vec<RoundRecord>,
}

/// History persisted as a JSON file.
///
/// The whole list is rewritten on every round: written to a sibling temp
/// file, synced, then renamed over the target.
#[derive(Debug)]
pub struct JsonFileStatistics {
    path: PathBuf,
    history: Mutex<Vec<RoundRecord>>,
}

impl JsonFileStatistics {
    /// Loads the history at `path`. A missing file is an empty history.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StatsError> {
        let path = path.into();
        let history = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| StatsError::Read {
                path: path.clone(),
                source: e,
            })?;
            let file: HistoryFile =
                serde_json::from_str(&content).map_err(|e| StatsError::Parse {
                    path: path.clone(),
                    source: e,
                })?;
            file.games
        } else {
            Vec::new()
        };

        log::debug!("Loaded {} games from {}", history.len(), path.display());
        Ok(Self {
            path,
            history: Mutex::new(history),
        })
    }
}

#[derive(serde::Serialize)]
struct HistoryFileRef<'a> {
    games: &'a [RoundRecord],
}

/// Blocking write of the whole history. Runs off the async workers.
fn write_history(path: &Path, games: &[RoundRecord]) -> Result<(), StatsError> {
    let write_err = |e| StatsError::Write {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    let content = serde_json::to_vec_pretty(&HistoryFileRef { games })?;
    let tmp_path = path.with_extension("json.tmp");
    let written = File::create(&tmp_path)
        .and_then(|mut tmp| {
            tmp.write_all(&content)?;
            tmp.sync_all()
        })
        .and_then(|()| fs::rename(&tmp_path, path));
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(write_err(e));
    }
    Ok(())
}

#[async_trait]
impl StatisticsStore for JsonFileStatistics {
    async fn record_round(&self, record: RoundRecord) -> Result<(), StatsError> {
        let mut history = self.history.lock().await;
        history.push(record);

        let path = self.path.clone();
        let games = history.clone();
        let written = tokio::task::spawn_blocking(move || write_history(&path, &games))
            .await
            .unwrap_or_else(|e| {
                Err(StatsError::Unavailable {
                    message: format!("history writer stopped: {}", e),
                })
            });
        if let Err(e) = written {
            // Keep memory in line with what is on disk.
            history.pop();
            return Err(e);
        }
        Ok(())
    }

    async fn current_aggregate(&self) -> Result<StatisticsAggregate, StatsError> {
        Ok(StatisticsAggregate::from_history(&self.history.lock().await))
    }
}
