//! Quiz session engine.
//!
//! Questions are served one pass at a time. A pass walks `pending` from the
//! cursor to the end; a wrong answer parks the question in `failed` and the
//! cursor moves on. When a pass is exhausted, `failed` becomes the next pass
//! (in catalog order) and every rebuilt entry is flagged as a retry. The
//! session finishes once a pass ends with nothing failed.
//!
//! `pending` is never edited mid-pass: entries behind the cursor are consumed
//! and only the slice `pending[cursor..]` is still awaiting presentation, so a
//! question id is never in both that slice and `failed`.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use crate::model::{
    AnswerId, AttemptRecord, Catalog, Player, Question, QuestionId, ResultRecord,
};
use crate::stats::SessionStats;
use crate::time::Clock;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Errors raised by the session engine. None of them change session state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("cannot start a session from an empty catalog")]
    EmptyCatalog,

    #[error("answer {answer} does not belong to current question {question}")]
    InvalidAnswer {
        question: QuestionId,
        answer: AnswerId,
    },

    #[error("session already finished")]
    Finished,
}

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Active,
    Finished,
}

/// What happened to the session after an answer was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// The current pass still has questions.
    Next,
    /// The pass ended with failures; a retry pass of `size` questions started.
    RetryPass { pass: u32, size: usize },
    /// Every question is completed. The record now belongs to the caller.
    Finished(ResultRecord),
}

/// Result of a single `submit_answer` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub question_id: QuestionId,
    pub correct: bool,
    /// Attempts on this question including the one just made.
    pub attempts: u32,
    pub next: Advance,
}

impl SubmitOutcome {
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self.next, Advance::Finished(_))
    }

    /// Take the result record out of a finishing outcome.
    #[must_use]
    pub fn into_result(self) -> Option<ResultRecord> {
        match self.next {
            Advance::Finished(record) => Some(record),
            _ => None,
        }
    }
}

/// Read-only view of the question being presented.
#[derive(Debug, Clone, Copy)]
pub struct CurrentQuestion<'a> {
    pub question: &'a Question,
    pub attempt: &'a AttemptRecord,
    /// 1-based pass number.
    pub pass: u32,
    /// 0-based position within the pass.
    pub position: usize,
    pub pass_len: usize,
}

/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub failed: usize,
    pub pass: u32,
    pub is_finished: bool,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Single-learner, in-memory quiz session.
pub struct QuizSession {
    player: Player,
    questions: Vec<Question>,
    records: Vec<AttemptRecord>,
    by_id: HashMap<QuestionId, usize>,
    // Catalog indices of the current pass.
    pending: Vec<usize>,
    cursor: usize,
    failed: BTreeSet<usize>,
    pass: u32,
    score: u32,
    phase: SessionPhase,
    clock: Clock,
    started_at: DateTime<Utc>,
}

impl QuizSession {
    /// Start a session over every question of `catalog`, in catalog order.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptyCatalog` if the catalog has no questions.
    pub fn new(player: Player, catalog: Catalog) -> Result<Self, SessionError> {
        if catalog.is_empty() {
            return Err(SessionError::EmptyCatalog);
        }

        let questions = catalog.into_questions();
        let records = questions
            .iter()
            .map(|q| AttemptRecord::new(q.id()))
            .collect();
        let by_id = questions
            .iter()
            .enumerate()
            .map(|(i, q)| (q.id(), i))
            .collect();
        let clock = Clock::default();

        Ok(Self {
            player,
            pending: (0..questions.len()).collect(),
            questions,
            records,
            by_id,
            cursor: 0,
            failed: BTreeSet::new(),
            pass: 1,
            score: 0,
            phase: SessionPhase::Active,
            started_at: clock.now(),
            clock,
        })
    }

    /// Use `clock` for the start and completion timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self.started_at = clock.now();
        self
    }

    #[must_use]
    pub fn player(&self) -> &Player {
        &self.player
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.phase == SessionPhase::Finished
    }

    /// Number of distinct questions answered correctly.
    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn pass(&self) -> u32 {
        self.pass
    }

    /// Questions still awaiting presentation in the current pass, current one included.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len().saturating_sub(self.cursor)
    }

    #[must_use]
    pub fn failed_len(&self) -> usize {
        self.failed.len()
    }

    pub fn pending_ids(&self) -> impl Iterator<Item = QuestionId> + '_ {
        self.pending
            .iter()
            .skip(self.cursor)
            .map(|&i| self.questions[i].id())
    }

    /// Questions parked for the next retry pass, in catalog order.
    pub fn failed_ids(&self) -> impl Iterator<Item = QuestionId> + '_ {
        self.failed.iter().map(|&i| self.questions[i].id())
    }

    #[must_use]
    pub fn attempts_for(&self, question_id: QuestionId) -> Option<u32> {
        self.record(question_id).map(AttemptRecord::attempts)
    }

    #[must_use]
    pub fn record(&self, question_id: QuestionId) -> Option<&AttemptRecord> {
        self.by_id.get(&question_id).map(|&i| &self.records[i])
    }

    /// Attempt records in catalog order.
    #[must_use]
    pub fn attempt_records(&self) -> &[AttemptRecord] {
        &self.records
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            total: self.questions.len(),
            completed: self.records.iter().filter(|r| r.completed()).count(),
            pending: self.pending_len(),
            failed: self.failed_len(),
            pass: self.pass,
            is_finished: self.is_finished(),
        }
    }

    /// The question to present, or `None` once finished. No side effects.
    #[must_use]
    pub fn current_question(&self) -> Option<CurrentQuestion<'_>> {
        let idx = self.current_index()?;
        Some(CurrentQuestion {
            question: &self.questions[idx],
            attempt: &self.records[idx],
            pass: self.pass,
            position: self.cursor,
            pass_len: self.pending.len(),
        })
    }

    fn current_index(&self) -> Option<usize> {
        if self.is_finished() {
            return None;
        }
        self.pending.get(self.cursor).copied()
    }

    /// Answer the current question and advance the session.
    ///
    /// On the last correct answer the session becomes `Finished` and the outcome
    /// carries the `ResultRecord`; the engine keeps no copy of it.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Finished` once the session is over, or
    /// `SessionError::InvalidAnswer` if `answer_id` is not one of the current
    /// question's answers. Neither changes any state.
    pub fn submit_answer(&mut self, answer_id: AnswerId) -> Result<SubmitOutcome, SessionError> {
        let idx = self.current_index().ok_or(SessionError::Finished)?;
        let question = &self.questions[idx];
        let question_id = question.id();
        let correct = question
            .answer(answer_id)
            .ok_or(SessionError::InvalidAnswer {
                question: question_id,
                answer: answer_id,
            })?
            .correct;

        let record = &mut self.records[idx];
        record.record_attempt();
        let attempts = record.attempts();

        if correct {
            record.mark_completed();
            self.score += 1;
            self.failed.remove(&idx);
        } else {
            self.failed.insert(idx);
        }
        self.cursor += 1;

        Ok(SubmitOutcome {
            question_id,
            correct,
            attempts,
            next: self.advance(),
        })
    }

    fn advance(&mut self) -> Advance {
        if self.cursor < self.pending.len() {
            return Advance::Next;
        }

        if !self.failed.is_empty() {
            self.pending = std::mem::take(&mut self.failed).into_iter().collect();
            for &i in &self.pending {
                self.records[i].mark_retry();
            }
            self.cursor = 0;
            self.pass += 1;
            debug!(pass = self.pass, size = self.pending.len(), "starting retry pass");
            return Advance::RetryPass {
                pass: self.pass,
                size: self.pending.len(),
            };
        }

        self.phase = SessionPhase::Finished;
        self.pending.clear();
        self.cursor = 0;

        let stats = SessionStats::from_attempts(&self.records);
        let record = ResultRecord::for_finished_session(
            self.player.clone(),
            &stats,
            self.score,
            self.pass,
            self.started_at,
            self.clock.now(),
        );
        debug!(
            player = %self.player.id(),
            score = self.score,
            total_attempts = stats.total_attempts,
            first_try_percentage = stats.first_try_percentage,
            passes = self.pass,
            "session finished"
        );
        Advance::Finished(record)
    }
}

impl fmt::Debug for QuizSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizSession")
            .field("player", &self.player.id())
            .field("questions_len", &self.questions.len())
            .field("pending_len", &self.pending_len())
            .field("failed_len", &self.failed.len())
            .field("pass", &self.pass)
            .field("score", &self.score)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Answer, PlayerId};
    use crate::time::{fixed_clock, fixed_now};
    use chrono::Duration;
    use proptest::prelude::*;

    const RIGHT: AnswerId = AnswerId::new(1);
    const WRONG: AnswerId = AnswerId::new(2);

    fn question(id: u64) -> Question {
        Question::new(
            QuestionId::new(id),
            format!("Q{id}"),
            vec![
                Answer::new(RIGHT, format!("right {id}"), true),
                Answer::new(WRONG, format!("wrong {id}"), false),
            ],
        )
        .unwrap()
    }

    fn session(n: u64) -> QuizSession {
        let catalog = Catalog::new((1..=n).map(question).collect()).unwrap();
        QuizSession::new(Player::anonymous(PlayerId::new(7)), catalog)
            .unwrap()
            .with_clock(fixed_clock())
    }

    fn current_id(s: &QuizSession) -> QuestionId {
        s.current_question().unwrap().question.id()
    }

    #[test]
    fn empty_catalog_is_rejected() {
        let err = QuizSession::new(Player::anonymous(PlayerId::new(1)), Catalog::default())
            .unwrap_err();
        assert_eq!(err, SessionError::EmptyCatalog);
    }

    #[test]
    fn initial_state_follows_catalog_order() {
        let s = session(3);
        assert_eq!(current_id(&s), QuestionId::new(1));
        assert_eq!(s.pending_len(), 3);
        assert_eq!(s.failed_len(), 0);
        assert_eq!(s.score(), 0);
        assert_eq!(s.pass(), 1);
        assert!(s.attempt_records().iter().all(|r| r.attempts() == 0));
    }

    #[test]
    fn current_question_is_idempotent() {
        let s = session(2);
        let a = current_id(&s);
        let b = current_id(&s);
        assert_eq!(a, b);
        assert_eq!(s.attempts_for(a), Some(0));
    }

    #[test]
    fn scenario_one_miss_then_retry() {
        let mut s = session(2);

        let out = s.submit_answer(RIGHT).unwrap();
        assert!(out.correct);
        assert_eq!(out.next, Advance::Next);
        assert_eq!(s.score(), 1);
        assert!(s.pending_ids().all(|id| id != QuestionId::new(1)));

        let out = s.submit_answer(WRONG).unwrap();
        assert!(!out.correct);
        assert_eq!(out.attempts, 1);
        assert_eq!(out.next, Advance::RetryPass { pass: 2, size: 1 });
        assert_eq!(s.attempts_for(QuestionId::new(2)), Some(1));

        let current = s.current_question().unwrap();
        assert_eq!(current.question.id(), QuestionId::new(2));
        assert!(current.attempt.is_retry());
        assert_eq!(current.pass, 2);
        assert_eq!(s.failed_len(), 0);

        let record = s.submit_answer(RIGHT).unwrap().into_result().unwrap();
        assert!(s.is_finished());
        assert_eq!(s.score(), 2);
        assert_eq!(record.first_try_percentage(), 50);
        assert_eq!(record.total_attempts(), 3);
        assert_eq!(record.passes(), 2);
        assert_eq!(record.total_questions(), 2);
        assert_eq!(record.player().id(), PlayerId::new(7));
    }

    #[test]
    fn failed_question_is_parked_until_pass_ends() {
        let mut s = session(3);
        s.submit_answer(WRONG).unwrap();

        assert_eq!(s.failed_ids().collect::<Vec<_>>(), vec![QuestionId::new(1)]);
        assert_eq!(
            s.pending_ids().collect::<Vec<_>>(),
            vec![QuestionId::new(2), QuestionId::new(3)]
        );
        assert_eq!(current_id(&s), QuestionId::new(2));
    }

    #[test]
    fn retry_pass_uses_catalog_order() {
        let mut s = session(4);
        // Miss 4, 2 and 3 in that presentation order after answering 1.
        s.submit_answer(RIGHT).unwrap();
        s.submit_answer(WRONG).unwrap();
        s.submit_answer(WRONG).unwrap();
        let out = s.submit_answer(WRONG).unwrap();
        assert_eq!(out.next, Advance::RetryPass { pass: 2, size: 3 });
        assert_eq!(
            s.pending_ids().collect::<Vec<_>>(),
            vec![QuestionId::new(2), QuestionId::new(3), QuestionId::new(4)]
        );
    }

    #[test]
    fn repeated_misses_count_every_attempt() {
        let mut s = session(1);
        for expected in 1..=3 {
            let out = s.submit_answer(WRONG).unwrap();
            assert_eq!(out.attempts, expected);
            assert_eq!(out.next, Advance::RetryPass { pass: expected + 1, size: 1 });
            assert_eq!(s.failed_len(), 0);
        }
        let record = s.submit_answer(RIGHT).unwrap().into_result().unwrap();
        assert_eq!(record.total_attempts(), 4);
        assert_eq!(record.first_try_percentage(), 0);
        assert_eq!(record.passes(), 4);
    }

    #[test]
    fn single_question_first_try_finishes_immediately() {
        let mut s = session(1);
        let out = s.submit_answer(RIGHT).unwrap();
        assert!(out.is_finished());
        let record = out.into_result().unwrap();
        assert_eq!(record.first_try_percentage(), 100);
        assert_eq!(record.total_attempts(), 1);
        assert!(s.current_question().is_none());
    }

    #[test]
    fn submit_after_finish_is_rejected() {
        let mut s = session(1);
        s.submit_answer(RIGHT).unwrap();
        let err = s.submit_answer(RIGHT).unwrap_err();
        assert_eq!(err, SessionError::Finished);
        assert_eq!(s.score(), 1);
        assert_eq!(s.attempts_for(QuestionId::new(1)), Some(1));
    }

    #[test]
    fn foreign_answer_leaves_state_untouched() {
        let mut s = session(2);
        let err = s.submit_answer(AnswerId::new(99)).unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidAnswer {
                question: QuestionId::new(1),
                answer: AnswerId::new(99),
            }
        );
        assert!(s.attempt_records().iter().all(|r| r.attempts() == 0));
        assert_eq!(current_id(&s), QuestionId::new(1));
        assert_eq!(s.pending_len(), 2);
    }

    #[test]
    fn result_timestamps_come_from_clock() {
        let catalog = Catalog::new(vec![question(1)]).unwrap();
        let mut clock = fixed_clock();
        let mut s = QuizSession::new(Player::anonymous(PlayerId::new(1)), catalog)
            .unwrap()
            .with_clock(clock);
        assert_eq!(s.started_at(), fixed_now());

        // The session holds its own copy of a fixed clock.
        clock.advance(Duration::minutes(5));
        let record = s.submit_answer(RIGHT).unwrap().into_result().unwrap();
        assert_eq!(record.started_at(), fixed_now());
        assert_eq!(record.completed_at(), fixed_now());
    }

    #[test]
    fn progress_reports_counts() {
        let mut s = session(3);
        s.submit_answer(RIGHT).unwrap();
        s.submit_answer(WRONG).unwrap();
        let p = s.progress();
        assert_eq!(
            p,
            SessionProgress {
                total: 3,
                completed: 1,
                pending: 1,
                failed: 1,
                pass: 1,
                is_finished: false,
            }
        );
    }

    fn assert_invariants(s: &QuizSession) {
        let pending: Vec<_> = s.pending_ids().collect();
        let failed: Vec<_> = s.failed_ids().collect();
        assert!(pending.iter().all(|id| !failed.contains(id)));

        let incomplete = s.attempt_records().iter().filter(|r| !r.completed()).count();
        assert_eq!(incomplete, pending.len() + failed.len());

        let completed = s.attempt_records().len() - incomplete;
        assert_eq!(s.score() as usize, completed);

        for r in s.attempt_records().iter().filter(|r| r.completed()) {
            assert!(!pending.contains(&r.question_id()));
            assert!(!failed.contains(&r.question_id()));
        }
        assert_eq!(s.is_finished(), pending.is_empty() && failed.is_empty());
    }

    proptest! {
        #[test]
        fn always_correct_finishes_in_one_pass(n in 1u64..12) {
            let mut s = session(n);
            let mut submissions = 0;
            while let Some(current) = s.current_question() {
                let answer = current.question.correct_answers().next().unwrap().id;
                s.submit_answer(answer).unwrap();
                submissions += 1;
            }
            prop_assert_eq!(submissions, n);
            prop_assert_eq!(s.pass(), 1);
            prop_assert_eq!(u64::from(s.score()), n);
        }

        #[test]
        fn invariants_hold_under_mixed_answers(
            n in 1u64..8,
            misses in proptest::collection::vec(any::<bool>(), 0..40),
        ) {
            let mut s = session(n);
            let mut misses = misses.into_iter();
            let mut before: Vec<u32> = vec![0; n as usize];
            assert_invariants(&s);

            while !s.is_finished() {
                let id = current_id(&s);
                let answer = if misses.next().unwrap_or(false) { WRONG } else { RIGHT };
                let out = s.submit_answer(answer).unwrap();
                prop_assert_eq!(out.question_id, id);

                let after: Vec<u32> = s.attempt_records().iter().map(AttemptRecord::attempts).collect();
                for (i, (b, a)) in before.iter().zip(&after).enumerate() {
                    let expected = if s.attempt_records()[i].question_id() == id { b + 1 } else { *b };
                    prop_assert_eq!(*a, expected);
                }
                before = after;
                assert_invariants(&s);
            }

            prop_assert_eq!(u64::from(s.score()), n);
            prop_assert!(s.current_question().is_none());
        }
    }
}
