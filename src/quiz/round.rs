//! Round state machine.
//!
//! `RoundState` only changes in response to two inputs: a question arriving
//! and an answer being submitted (plus the feedback pause running out). It
//! does no I/O and knows nothing about timers; `RoundEngine` drives it.
//!
//! ```text
//! AwaitingQuestion ──→ AwaitingAnswer ──→ Evaluating ──→ AwaitingQuestion
//!        │                                    │
//!        └──→ Aborted                         └──→ Finished
//! ```

use chrono::{DateTime, Local};

use super::stats::RoundRecord;
use super::Question;

/// Position of a round in its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// A question has been requested and hasn't arrived yet.
    #[default]
    AwaitingQuestion,
    /// A question is on screen, waiting for the player.
    AwaitingAnswer,
    /// The answer was scored; the feedback pause is running.
    Evaluating,
    /// All questions answered and the record produced.
    Finished,
    /// The question source failed or ran dry before the last question.
    Aborted,
}

impl Phase {
    /// No further input is accepted in a terminal phase.
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Finished | Phase::Aborted)
    }
}

/// Result of handing an answer to the round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerVerdict {
    Correct,
    Incorrect,
    /// The round wasn't waiting for an answer. Nothing changed.
    Ignored,
}

impl AnswerVerdict {
    pub fn is_correct(self) -> Option<bool> {
        match self {
            AnswerVerdict::Correct => Some(true),
            AnswerVerdict::Incorrect => Some(false),
            AnswerVerdict::Ignored => None,
        }
    }
}

/// Result of a question (or its absence) reaching the round.
#[derive(Debug, Clone, PartialEq)]
pub enum Arrival {
    /// The question is now current; the player can answer.
    Presented,
    /// Nothing more was needed: the round is complete.
    Finished(RoundRecord),
    /// The source came back empty before `total` was reached.
    Drained,
    /// The round wasn't waiting for a question.
    Ignored,
}

/// What happens once the feedback pause is over.
#[derive(Debug, Clone, PartialEq)]
pub enum Continuation {
    /// Back to `AwaitingQuestion`; the next question must be requested.
    NextQuestion,
    Finished(RoundRecord),
    Ignored,
}

/// State of a single round. Holds `correct_count <= index <= total` at all times.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundState {
    index: usize,
    total: usize,
    correct_count: usize,
    current_question: Option<Question>,
    phase: Phase,
}

impl RoundState {
    /// Fresh round of `total` questions. `None` when `total` is zero.
    pub fn new(total: usize) -> Option<Self> {
        if total == 0 {
            return None;
        }
        Some(Self {
            index: 0,
            total,
            correct_count: 0,
            current_question: None,
            phase: Phase::AwaitingQuestion,
        })
    }

    /// Number of answered questions.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn correct_count(&self) -> usize {
        self.correct_count
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.current_question.as_ref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_complete(&self) -> bool {
        self.index >= self.total
    }

    pub fn receive_question(&mut self, question: Option<Question>, now: DateTime<Local>) -> Arrival {
        if self.phase != Phase::AwaitingQuestion {
            return Arrival::Ignored;
        }

        match question {
            // Source exhausted exactly at the end: a normal finish.
            _ if self.is_complete() => Arrival::Finished(self.finish(now)),
            Some(question) => {
                self.current_question = Some(question);
                self.phase = Phase::AwaitingAnswer;
                Arrival::Presented
            }
            None => {
                self.phase = Phase::Aborted;
                Arrival::Drained
            }
        }
    }

    /// The pending question request failed. Returns `false` if no request
    /// was pending.
    pub fn fail(&mut self) -> bool {
        if self.phase != Phase::AwaitingQuestion {
            return false;
        }
        self.phase = Phase::Aborted;
        true
    }

    pub fn submit_answer(&mut self, tap: bool) -> AnswerVerdict {
        if self.phase != Phase::AwaitingAnswer {
            return AnswerVerdict::Ignored;
        }
        let Some(question) = self.current_question.as_ref() else {
            return AnswerVerdict::Ignored;
        };

        let is_correct = question.correct_answer == tap;
        if is_correct {
            self.correct_count += 1;
        }
        self.index += 1;
        self.phase = Phase::Evaluating;

        if is_correct {
            AnswerVerdict::Correct
        } else {
            AnswerVerdict::Incorrect
        }
    }

    pub fn feedback_elapsed(&mut self, now: DateTime<Local>) -> Continuation {
        if self.phase != Phase::Evaluating {
            return Continuation::Ignored;
        }
        if self.is_complete() {
            return Continuation::Finished(self.finish(now));
        }
        self.phase = Phase::AwaitingQuestion;
        Continuation::NextQuestion
    }

    fn finish(&mut self, now: DateTime<Local>) -> RoundRecord {
        self.phase = Phase::Finished;
        self.current_question = None;
        RoundRecord::new(self.correct_count, self.total, now)
    }
}
