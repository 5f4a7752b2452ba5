mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, TimeZone};
use common::{Event, FailingStore, Harness, ScriptedSource, SlowStore, FEEDBACK_DELAY};
use movie_quiz::{AnswerVerdict, MemoryStatistics, Phase, Question, RoundRecord};

#[tokio::test(start_paused = true)]
async fn perfect_round_ends_once_with_best_record() {
    let earlier = Local.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).single().unwrap();
    let store = Arc::new(MemoryStatistics::with_history(vec![RoundRecord::new(7, 10, earlier)]));
    let mut harness = Harness::new(ScriptedSource::with_answers(&[true; 10]), store.clone());

    assert!(harness.engine.start_round(10));
    for i in 0..10 {
        let answer = harness.expect_question().await;
        assert_eq!(harness.engine.submit_answer(answer), AnswerVerdict::Correct);
        assert_eq!(harness.next_event().await, Event::Answer(true));

        let round = harness.engine.snapshot().unwrap();
        assert_eq!(round.index(), i + 1);
        assert!(round.correct_count() <= round.index() && round.index() <= round.total());
        assert_eq!(round.phase(), Phase::Evaluating);
    }

    match harness.next_event().await {
        Event::Ended {
            record,
            aggregate,
            stale,
        } => {
            assert_eq!((record.correct, record.total), (10, 10));
            assert!(!stale);
            let aggregate = aggregate.unwrap();
            assert_eq!(aggregate.games_played, 2);
            assert_eq!(aggregate.best_record, Some(record));
            assert_eq!(aggregate.total_accuracy, 85.0);
        }
        other => panic!("expected round end, got {:?}", other),
    }

    let round = harness.engine.snapshot().unwrap();
    assert_eq!(round.phase(), Phase::Finished);
    assert_eq!(round.index(), 10);
    assert!(harness.drain().await.is_empty());
    assert_eq!(store.history().await.len(), 2);
    // The last answer finishes the round without asking for an 11th question.
    assert_eq!(harness.source.calls(), 10);
}

#[tokio::test(start_paused = true)]
async fn mixed_answers_are_tallied() {
    let mut harness = Harness::new(
        ScriptedSource::with_answers(&[true, false, true]),
        Arc::new(MemoryStatistics::new()),
    );
    harness.engine.start_round(3);

    let mut verdicts = Vec::new();
    for tap in [true, true, false] {
        harness.expect_question().await;
        verdicts.push(harness.engine.submit_answer(tap));
        harness.next_event().await;
    }
    assert_eq!(
        verdicts,
        [AnswerVerdict::Correct, AnswerVerdict::Incorrect, AnswerVerdict::Incorrect]
    );

    match harness.next_event().await {
        Event::Ended { record, .. } => assert_eq!((record.correct, record.total), (1, 3)),
        other => panic!("expected round end, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn questions_are_numbered() {
    let mut harness = Harness::new(
        ScriptedSource::with_answers(&[true, true]),
        Arc::new(MemoryStatistics::new()),
    );
    harness.engine.start_round(2);

    assert!(matches!(
        harness.next_event().await,
        Event::Question { number: 1, total: 2, .. }
    ));
    harness.engine.submit_answer(true);
    harness.next_event().await;
    assert!(matches!(
        harness.next_event().await,
        Event::Question { number: 2, total: 2, .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn duplicate_answer_is_ignored() {
    let mut harness = Harness::new(
        ScriptedSource::with_answers(&[false, false]),
        Arc::new(MemoryStatistics::new()),
    );
    harness.engine.start_round(2);
    harness.expect_question().await;

    assert_eq!(harness.engine.submit_answer(false), AnswerVerdict::Correct);
    let before = harness.engine.snapshot();
    assert_eq!(harness.engine.submit_answer(true), AnswerVerdict::Ignored);
    assert_eq!(harness.engine.submit_answer(false), AnswerVerdict::Ignored);
    assert_eq!(harness.engine.snapshot(), before);

    assert_eq!(harness.next_event().await, Event::Answer(true));
    assert!(matches!(harness.next_event().await, Event::Question { .. }));
    assert_eq!(harness.engine.snapshot().unwrap().index(), 1);
}

#[tokio::test(start_paused = true)]
async fn answer_before_first_question_is_ignored() {
    let mut harness = Harness::new(
        ScriptedSource::with_answers(&[true]),
        Arc::new(MemoryStatistics::new()),
    );
    assert_eq!(harness.engine.submit_answer(true), AnswerVerdict::Ignored);

    harness.engine.start_round(1);
    assert_eq!(harness.engine.submit_answer(true), AnswerVerdict::Ignored);
    assert_eq!(harness.engine.snapshot().unwrap().phase(), Phase::AwaitingQuestion);
    harness.expect_question().await;
}

#[tokio::test(start_paused = true)]
async fn source_running_dry_early_is_a_failure() {
    let mut harness = Harness::new(
        ScriptedSource::with_answers(&[true; 4]),
        Arc::new(MemoryStatistics::new()),
    );
    harness.engine.start_round(10);

    for _ in 0..4 {
        let answer = harness.expect_question().await;
        harness.engine.submit_answer(answer);
        harness.next_event().await;
    }

    match harness.next_event().await {
        Event::SourceError(message) => assert!(message.contains("4 of 10"), "{}", message),
        other => panic!("expected source error, got {:?}", other),
    }
    let round = harness.engine.snapshot().unwrap();
    assert_eq!(round.phase(), Phase::Aborted);
    assert_eq!(round.index(), 4);
    assert_eq!(harness.source.calls(), 5);
    assert!(harness.drain().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn fetch_error_is_reported() {
    let source = ScriptedSource::with_answers(&[true]);
    source.push_error("connection reset");
    let mut harness = Harness::new(source, Arc::new(MemoryStatistics::new()));
    harness.engine.start_round(3);

    let answer = harness.expect_question().await;
    harness.engine.submit_answer(answer);
    harness.next_event().await;

    match harness.next_event().await {
        Event::SourceError(message) => {
            assert!(message.contains("1 of 3"), "{}", message);
            assert!(message.contains("connection reset"), "{}", message);
        }
        other => panic!("expected source error, got {:?}", other),
    }
    assert_eq!(harness.engine.submit_answer(true), AnswerVerdict::Ignored);
}

#[tokio::test(start_paused = true)]
async fn failed_save_still_reports_round() {
    let mut harness = Harness::new(
        ScriptedSource::with_answers(&[true, false]),
        Arc::new(FailingStore::default()),
    );
    harness.engine.start_round(2);
    for _ in 0..2 {
        let answer = harness.expect_question().await;
        harness.engine.submit_answer(answer);
        harness.next_event().await;
    }

    match harness.next_event().await {
        Event::Ended {
            record,
            aggregate,
            stale,
        } => {
            assert_eq!((record.correct, record.total), (2, 2));
            assert!(stale);
            assert_eq!(aggregate.map(|a| a.games_played), Some(0));
        }
        other => panic!("expected round end, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn retry_restarts_from_zero_once() {
    let source = ScriptedSource::with_answers(&[true, true, false, false]);
    let mut harness = Harness::new(source, Arc::new(MemoryStatistics::new()));
    harness.engine.start_round(2);
    assert!(!harness.engine.retry());

    for _ in 0..2 {
        let answer = harness.expect_question().await;
        harness.engine.submit_answer(answer);
        harness.next_event().await;
    }
    assert!(matches!(harness.next_event().await, Event::Ended { .. }));

    assert!(harness.engine.retry());
    assert!(!harness.engine.retry());
    let round = harness.engine.snapshot().unwrap();
    assert_eq!((round.index(), round.correct_count(), round.total()), (0, 0, 2));

    assert!(!harness.expect_question().await);
    assert!(!harness.engine.retry());
    assert_eq!(harness.engine.submit_answer(true), AnswerVerdict::Incorrect);
    assert_eq!(harness.source.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn next_round_waits_for_previous_result() {
    let store = Arc::new(SlowStore {
        inner: MemoryStatistics::new(),
        delay: Duration::from_secs(5),
    });
    let mut harness = Harness::new(ScriptedSource::with_answers(&[true, true]), store);
    harness.engine.start_round(1);

    harness.expect_question().await;
    harness.engine.submit_answer(true);
    harness.next_event().await;

    // Past the feedback pause, while the store is still saving.
    tokio::time::sleep(FEEDBACK_DELAY + Duration::from_millis(100)).await;
    assert_eq!(harness.engine.snapshot().unwrap().phase(), Phase::Finished);
    assert!(harness.engine.retry());

    assert!(matches!(harness.next_event().await, Event::Ended { .. }));
    assert!(matches!(harness.next_event().await, Event::Question { .. }));
}

#[tokio::test(start_paused = true)]
async fn restart_mid_feedback_discards_old_timer() {
    let mut harness = Harness::new(
        ScriptedSource::with_answers(&[true, true, true]),
        Arc::new(MemoryStatistics::new()),
    );
    harness.engine.start_round(2);
    harness.expect_question().await;
    harness.engine.submit_answer(true);
    harness.next_event().await;

    assert!(harness.engine.start_round(2));
    harness.expect_question().await;

    let events = harness.drain().await;
    assert!(events.is_empty(), "{:?}", events);
    let round = harness.engine.snapshot().unwrap();
    assert_eq!(round.phase(), Phase::AwaitingAnswer);
    assert_eq!(round.index(), 0);
    assert_eq!(harness.source.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn switching_source_waits_for_previous_result() {
    let store = Arc::new(SlowStore {
        inner: MemoryStatistics::new(),
        delay: Duration::from_secs(5),
    });
    let mut harness = Harness::new(ScriptedSource::with_answers(&[true, true]), store);
    harness.engine.start_round(1);

    harness.expect_question().await;
    harness.engine.submit_answer(true);
    harness.next_event().await;
    tokio::time::sleep(FEEDBACK_DELAY + Duration::from_millis(100)).await;

    let other = Arc::new(ScriptedSource::default());
    other.push_question(Question::new("Another topic", false));
    assert!(!harness.engine.start_round_from(other.clone(), 0));
    assert!(harness.engine.start_round_from(other.clone(), 1));

    assert!(matches!(harness.next_event().await, Event::Ended { .. }));
    match harness.next_event().await {
        Event::Question { question, .. } => assert_eq!(question.text, "Another topic"),
        other => panic!("expected a question, got {:?}", other),
    }
    assert_eq!(harness.source.calls(), 1);
    assert_eq!(other.calls(), 1);
}
