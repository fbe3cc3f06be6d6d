use crate::model::ids::QuestionId;

/// Per-question progress within a session.
///
/// Created with the session (zero attempts, not completed) and mutated only by
/// the session engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    question_id: QuestionId,
    attempts: u32,
    completed: bool,
    is_retry: bool,
}

impl AttemptRecord {
    #[must_use]
    pub fn new(question_id: QuestionId) -> Self {
        Self {
            question_id,
            attempts: 0,
            completed: false,
            is_retry: false,
        }
    }

    /// Rebuild a record with explicit values, e.g. for statistics fixtures.
    #[must_use]
    pub fn from_parts(question_id: QuestionId, attempts: u32, completed: bool, is_retry: bool) -> Self {
        Self {
            question_id,
            attempts,
            completed,
            is_retry,
        }
    }

    #[must_use]
    pub fn question_id(&self) -> QuestionId {
        self.question_id
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub fn completed(&self) -> bool {
        self.completed
    }

    /// True once the question is being served from the retry queue.
    #[must_use]
    pub fn is_retry(&self) -> bool {
        self.is_retry
    }

    /// Completed with exactly one recorded attempt.
    #[must_use]
    pub fn is_first_try(&self) -> bool {
        self.completed && self.attempts == 1
    }

    pub(crate) fn record_attempt(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
    }

    pub(crate) fn mark_completed(&mut self) {
        self.completed = true;
    }

    pub(crate) fn mark_retry(&mut self) {
        self.is_retry = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_starts_empty() {
        let rec = AttemptRecord::new(QuestionId::new(1));
        assert_eq!(rec.attempts(), 0);
        assert!(!rec.completed());
        assert!(!rec.is_retry());
        assert!(!rec.is_first_try());
    }

    #[test]
    fn first_try_requires_completion_on_single_attempt() {
        let mut rec = AttemptRecord::new(QuestionId::new(1));
        rec.record_attempt();
        assert!(!rec.is_first_try());
        rec.mark_completed();
        assert!(rec.is_first_try());
        rec.record_attempt();
        assert!(!rec.is_first_try());
    }
}
