//! Async driver for a quiz round.
//!
//! `RoundEngine` owns the current `RoundState` behind a mutex and applies
//! every transition under it, so racing inputs (a double tap, a late
//! question) can't advance the round twice. Work that has to wait (fetching a
//! question, the feedback pause, saving the result) runs in spawned tasks
//! tagged with the round's generation. Tasks from a superseded round find a
//! different generation and drop their result.
//!
//! Finishing a round is detached from the round itself: the store calls keep
//! running even if the round is replaced or the engine dropped, and the next
//! round doesn't fetch its first question before they complete.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::Local;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::error::{RoundError, SourceError, StatsError};
use super::round::{AnswerVerdict, Arrival, Continuation, RoundState};
use super::stats::{RoundRecord, StatisticsAggregate, StatisticsStore};
use super::{Question, QuestionSource};

/// How rounds are played.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundSettings {
    pub questions_per_round: usize,
    /// Pause between scoring an answer and moving on.
    pub feedback_delay: Duration,
}

impl Default for RoundSettings {
    fn default() -> Self {
        Self {
            questions_per_round: 10,
            feedback_delay: Duration::from_secs(1),
        }
    }
}

/// Statistics handed out with a finished round.
#[derive(Debug)]
pub enum RoundStatistics {
    /// Aggregate including the round that just ended.
    Current(StatisticsAggregate),
    /// The round couldn't be saved (or the aggregate couldn't be read). The
    /// aggregate, if any, may not include the round.
    Stale {
        aggregate: Option<StatisticsAggregate>,
        error: StatsError,
    },
}

impl RoundStatistics {
    pub fn aggregate(&self) -> Option<&StatisticsAggregate> {
        match self {
            RoundStatistics::Current(aggregate) => Some(aggregate),
            RoundStatistics::Stale { aggregate, .. } => aggregate.as_ref(),
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, RoundStatistics::Stale { .. })
    }
}

/// Receives everything the player needs to see.
///
/// Called from engine tasks, never while the round lock is held, so an
/// observer may call back into the engine.
pub trait RoundObserver: Send + Sync {
    /// A question is ready. `number` is 1-based.
    fn on_new_question(&self, question: &Question, number: usize, total: usize);

    /// Sent as soon as an answer is scored, before the feedback pause.
    fn on_answer_evaluated(&self, is_correct: bool);

    fn on_round_ended(&self, record: &RoundRecord, statistics: &RoundStatistics);

    fn on_source_error(&self, error: &RoundError);
}

/// Drives rounds against one question source, one statistics store and one
/// observer. Requires a Tokio runtime.
pub struct RoundEngine {
    shared: Arc<Shared>,
}

struct Shared {
    store: Arc<dyn StatisticsStore>,
    observer: Arc<dyn RoundObserver>,
    feedback_delay: Duration,
    /// Number of finalizations still talking to the store.
    finalizing: Arc<watch::Sender<usize>>,
    inner: Mutex<Inner>,
}

struct Inner {
    source: Arc<dyn QuestionSource>,
    round: Option<RoundState>,
    generation: u64,
    total: usize,
    fetch: Option<JoinHandle<()>>,
    feedback: Option<JoinHandle<()>>,
}

impl Inner {
    fn cancel_pending(&mut self) {
        if let Some(handle) = self.fetch.take() {
            handle.abort();
        }
        if let Some(handle) = self.feedback.take() {
            handle.abort();
        }
    }
}

enum Event {
    Question {
        question: Question,
        number: usize,
        total: usize,
    },
    Finished {
        record: RoundRecord,
        guard: FinalizeGuard,
    },
    Failed(RoundError),
}

/// Counts a finalization as running until dropped.
struct FinalizeGuard(Arc<watch::Sender<usize>>);

impl FinalizeGuard {
    fn new(counter: &Arc<watch::Sender<usize>>) -> Self {
        counter.send_modify(|n| *n += 1);
        Self(Arc::clone(counter))
    }
}

impl Drop for FinalizeGuard {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n = n.saturating_sub(1));
    }
}

impl RoundEngine {
    pub fn new(
        source: Arc<dyn QuestionSource>,
        store: Arc<dyn StatisticsStore>,
        observer: Arc<dyn RoundObserver>,
        feedback_delay: Duration,
    ) -> Self {
        let (finalizing, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                store,
                observer,
                feedback_delay,
                finalizing: Arc::new(finalizing),
                inner: Mutex::new(Inner {
                    source,
                    round: None,
                    generation: 0,
                    total: 0,
                    fetch: None,
                    feedback: None,
                }),
            }),
        }
    }

    /// Starts a fresh round of `total` questions, replacing any round in
    /// progress. Returns `false` (and changes nothing) if `total` is zero.
    pub fn start_round(&self, total: usize) -> bool {
        let mut inner = self.shared.lock();
        self.shared.start_locked(&mut inner, total)
    }

    /// Switches to another question source and starts a round from it.
    /// Like `start_round`, the first question still waits for the previous
    /// round's result to be reported.
    pub fn start_round_from(&self, source: Arc<dyn QuestionSource>, total: usize) -> bool {
        if total == 0 {
            log::warn!("Refusing to start a round with no questions");
            return false;
        }
        let mut inner = self.shared.lock();
        inner.source = source;
        self.shared.start_locked(&mut inner, total)
    }

    /// Starts another round with the same number of questions as the last
    /// one, but only once that round is over. Repeated calls before the new
    /// round's first question arrives are ignored.
    pub fn retry(&self) -> bool {
        let mut inner = self.shared.lock();
        let over = inner.round.as_ref().map_or(false, |round| round.phase().is_terminal());
        if !over {
            log::debug!("Retry ignored: round still in progress");
            return false;
        }
        let total = inner.total;
        self.shared.start_locked(&mut inner, total)
    }

    /// Scores the player's answer. Returns `AnswerVerdict::Ignored` unless a
    /// question is waiting for an answer.
    pub fn submit_answer(&self, tap: bool) -> AnswerVerdict {
        let (verdict, generation) = {
            let mut inner = self.shared.lock();
            let generation = inner.generation;
            let Some(round) = inner.round.as_mut() else {
                return AnswerVerdict::Ignored;
            };

            let verdict = round.submit_answer(tap);
            if verdict == AnswerVerdict::Ignored {
                log::debug!("Answer ignored in phase {:?}", round.phase());
                return verdict;
            }
            log::debug!(
                "Answer {}/{}: {:?} ({} correct)",
                round.index(),
                round.total(),
                verdict,
                round.correct_count()
            );
            (verdict, generation)
        };

        self.shared
            .observer
            .on_answer_evaluated(verdict == AnswerVerdict::Correct);

        // The pause starts only after the verdict is out, so nothing that
        // follows it can reach the observer first.
        let mut inner = self.shared.lock();
        if inner.generation == generation {
            inner.feedback = Some(spawn_feedback(&self.shared, generation));
        }
        verdict
    }

    /// Copy of the current round, if one was started.
    pub fn snapshot(&self) -> Option<RoundState> {
        self.shared.lock().round.clone()
    }
}

impl Drop for RoundEngine {
    fn drop(&mut self) {
        let mut inner = self.shared.lock();
        inner.cancel_pending();
        inner.generation += 1;
        inner.round = None;
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start_locked(self: &Arc<Self>, inner: &mut Inner, total: usize) -> bool {
        let Some(round) = RoundState::new(total) else {
            log::warn!("Refusing to start a round with no questions");
            return false;
        };

        inner.cancel_pending();
        inner.generation += 1;
        inner.total = total;
        inner.round = Some(round);
        inner.fetch = Some(spawn_fetch(self, Arc::clone(&inner.source), inner.generation));

        log::info!("Round {} started: {} questions", inner.generation, total);
        true
    }

    fn question_arrived(self: &Arc<Self>, generation: u64, result: Result<Option<Question>, SourceError>) {
        let event = {
            let mut inner = self.lock();
            if inner.generation != generation {
                log::debug!("Dropping question for superseded round {}", generation);
                return;
            }
            inner.fetch = None;
            let Some(round) = inner.round.as_mut() else {
                return;
            };

            match result {
                Ok(question) => match round.receive_question(question, Local::now()) {
                    Arrival::Presented => match round.current_question() {
                        Some(question) => Event::Question {
                            question: question.clone(),
                            number: round.index() + 1,
                            total: round.total(),
                        },
                        None => return,
                    },
                    Arrival::Finished(record) => Event::Finished {
                        record,
                        guard: FinalizeGuard::new(&self.finalizing),
                    },
                    Arrival::Drained => Event::Failed(RoundError::SourceDrained {
                        answered: round.index(),
                        total: round.total(),
                    }),
                    Arrival::Ignored => return,
                },
                Err(source) => {
                    if !round.fail() {
                        return;
                    }
                    Event::Failed(RoundError::SourceFailure {
                        answered: round.index(),
                        total: round.total(),
                        source,
                    })
                }
            }
        };

        self.dispatch(event);
    }

    fn feedback_elapsed(self: &Arc<Self>, generation: u64) {
        let event = {
            let mut inner = self.lock();
            if inner.generation != generation {
                return;
            }
            inner.feedback = None;
            let Some(round) = inner.round.as_mut() else {
                return;
            };

            match round.feedback_elapsed(Local::now()) {
                Continuation::NextQuestion => {
                    inner.fetch = Some(spawn_fetch(self, Arc::clone(&inner.source), generation));
                    return;
                }
                Continuation::Finished(record) => Event::Finished {
                    record,
                    guard: FinalizeGuard::new(&self.finalizing),
                },
                Continuation::Ignored => return,
            }
        };

        self.dispatch(event);
    }

    fn dispatch(&self, event: Event) {
        match event {
            Event::Question {
                question,
                number,
                total,
            } => self.observer.on_new_question(&question, number, total),
            Event::Finished { record, guard } => {
                log::info!("Round finished: {}/{}", record.correct, record.total);
                let store = Arc::clone(&self.store);
                let observer = Arc::clone(&self.observer);
                tokio::spawn(finalize(store, observer, record, guard));
            }
            Event::Failed(error) => {
                log::warn!("Round aborted: {}", error);
                self.observer.on_source_error(&error);
            }
        }
    }
}

fn spawn_fetch(
    shared: &Arc<Shared>,
    source: Arc<dyn QuestionSource>,
    generation: u64,
) -> JoinHandle<()> {
    let weak: Weak<Shared> = Arc::downgrade(shared);
    let mut finalizing = shared.finalizing.subscribe();

    tokio::spawn(async move {
        // The previous round's result must be out before this round shows
        // anything.
        let idle = finalizing.wait_for(|running| *running == 0).await.is_ok();
        if !idle {
            return;
        }
        let result = source.request_next().await;
        if let Some(shared) = weak.upgrade() {
            shared.question_arrived(generation, result);
        }
    })
}

fn spawn_feedback(shared: &Arc<Shared>, generation: u64) -> JoinHandle<()> {
    let weak = Arc::downgrade(shared);
    let delay = shared.feedback_delay;

    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Some(shared) = weak.upgrade() {
            shared.feedback_elapsed(generation);
        }
    })
}

async fn finalize(
    store: Arc<dyn StatisticsStore>,
    observer: Arc<dyn RoundObserver>,
    record: RoundRecord,
    guard: FinalizeGuard,
) {
    let statistics = match store.record_round(record.clone()).await {
        Ok(()) => match store.current_aggregate().await {
            Ok(aggregate) => RoundStatistics::Current(aggregate),
            Err(error) => {
                log::error!("Failed to read statistics: {}", error);
                RoundStatistics::Stale {
                    aggregate: None,
                    error,
                }
            }
        },
        Err(error) => {
            log::error!("Failed to save round result: {}", error);
            RoundStatistics::Stale {
                aggregate: store.current_aggregate().await.ok(),
                error,
            }
        }
    };

    observer.on_round_ended(&record, &statistics);
    drop(guard);
}
