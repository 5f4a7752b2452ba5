#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use movie_quiz::{
    MemoryStatistics, Question, QuestionSource, RoundEngine, RoundError, RoundObserver,
    RoundRecord, RoundStatistics, SourceError, StatisticsAggregate, StatisticsStore, StatsError,
};
use tokio::sync::mpsc;

pub const FEEDBACK_DELAY: Duration = Duration::from_secs(1);

/// Hands out a fixed script of replies, then `Ok(None)`.
#[derive(Default)]
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<Option<Question>, SourceError>>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    /// One question per entry; the entry is its correct answer.
    pub fn with_answers(answers: &[bool]) -> Self {
        let source = Self::default();
        for (i, answer) in answers.iter().enumerate() {
            source.push_question(Question::new(format!("Question {}", i + 1), *answer));
        }
        source
    }

    pub fn push_question(&self, question: Question) {
        self.script.lock().unwrap().push_back(Ok(Some(question)));
    }

    pub fn push_error(&self, message: &str) {
        self.script.lock().unwrap().push_back(Err(SourceError::Fetch {
            message: message.to_string(),
        }));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuestionSource for ScriptedSource {
    async fn request_next(&self) -> Result<Option<Question>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Question {
        question: Question,
        number: usize,
        total: usize,
    },
    Answer(bool),
    Ended {
        record: RoundRecord,
        aggregate: Option<StatisticsAggregate>,
        stale: bool,
    },
    SourceError(String),
}

pub struct RecordingObserver(mpsc::UnboundedSender<Event>);

impl RoundObserver for RecordingObserver {
    fn on_new_question(&self, question: &Question, number: usize, total: usize) {
        let _ = self.0.send(Event::Question {
            question: question.clone(),
            number,
            total,
        });
    }

    fn on_answer_evaluated(&self, is_correct: bool) {
        let _ = self.0.send(Event::Answer(is_correct));
    }

    fn on_round_ended(&self, record: &RoundRecord, statistics: &RoundStatistics) {
        let _ = self.0.send(Event::Ended {
            record: record.clone(),
            aggregate: statistics.aggregate().cloned(),
            stale: statistics.is_stale(),
        });
    }

    fn on_source_error(&self, error: &RoundError) {
        let _ = self.0.send(Event::SourceError(error.to_string()));
    }
}

/// Refuses to save anything but still reports what it already has.
#[derive(Default)]
pub struct FailingStore {
    inner: MemoryStatistics,
}

#[async_trait]
impl StatisticsStore for FailingStore {
    async fn record_round(&self, _record: RoundRecord) -> Result<(), StatsError> {
        Err(StatsError::Unavailable {
            message: "disk full".to_string(),
        })
    }

    async fn current_aggregate(&self) -> Result<StatisticsAggregate, StatsError> {
        self.inner.current_aggregate().await
    }
}

/// Takes a while to save each round.
pub struct SlowStore {
    pub inner: MemoryStatistics,
    pub delay: Duration,
}

#[async_trait]
impl StatisticsStore for SlowStore {
    async fn record_round(&self, record: RoundRecord) -> Result<(), StatsError> {
        tokio::time::sleep(self.delay).await;
        self.inner.record_round(record).await
    }

    async fn current_aggregate(&self) -> Result<StatisticsAggregate, StatsError> {
        self.inner.current_aggregate().await
    }
}

pub struct Harness {
    pub engine: RoundEngine,
    pub source: Arc<ScriptedSource>,
    pub events: mpsc::UnboundedReceiver<Event>,
}

impl Harness {
    pub fn new(source: ScriptedSource, store: Arc<dyn StatisticsStore>) -> Self {
        let source = Arc::new(source);
        let (tx, events) = mpsc::unbounded_channel();
        let engine = RoundEngine::new(
            source.clone(),
            store,
            Arc::new(RecordingObserver(tx)),
            FEEDBACK_DELAY,
        );
        Self {
            engine,
            source,
            events,
        }
    }

    pub async fn next_event(&mut self) -> Event {
        self.events.recv().await.expect("observer channel closed")
    }

    /// Waits for a question and returns its correct answer.
    pub async fn expect_question(&mut self) -> bool {
        match self.next_event().await {
            Event::Question { question, .. } => question.correct_answer,
            other => panic!("expected a question, got {:?}", other),
        }
    }

    /// Lets every pending timer and task run, then returns what was emitted.
    pub async fn drain(&mut self) -> Vec<Event> {
        tokio::time::sleep(FEEDBACK_DELAY * 5).await;
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}
