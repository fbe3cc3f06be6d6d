use std::collections::HashSet;

use thiserror::Error;

use crate::model::ids::{AnswerId, QuestionId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question {0} has an empty prompt")]
    EmptyPrompt(QuestionId),

    #[error("question {0} has no answers")]
    NoAnswers(QuestionId),

    #[error("question {question} has an answer with empty text ({answer})")]
    EmptyAnswerText {
        question: QuestionId,
        answer: AnswerId,
    },

    #[error("question {question} lists answer {answer} more than once")]
    DuplicateAnswer {
        question: QuestionId,
        answer: AnswerId,
    },

    #[error("question {0} has no answer flagged correct")]
    NoCorrectAnswer(QuestionId),
}

//
// ─── ANSWER ────────────────────────────────────────────────────────────────────
//

/// A candidate answer for a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub id: AnswerId,
    pub text: String,
    pub correct: bool,
}

impl Answer {
    #[must_use]
    pub fn new(id: AnswerId, text: impl Into<String>, correct: bool) -> Self {
        Self {
            id,
            text: text.into(),
            correct,
        }
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A question with its ordered candidate answers.
///
/// Immutable once built. More than one answer may be flagged correct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    prompt: String,
    answers: Vec<Answer>,
}

impl Question {
    /// Build a validated question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the prompt or any answer text is blank, if there
    /// are no answers, if an answer id repeats, or if no answer is flagged correct.
    pub fn new(
        id: QuestionId,
        prompt: impl Into<String>,
        answers: Vec<Answer>,
    ) -> Result<Self, QuestionError> {
        let prompt = prompt.into().trim().to_owned();
        if prompt.is_empty() {
            return Err(QuestionError::EmptyPrompt(id));
        }
        if answers.is_empty() {
            return Err(QuestionError::NoAnswers(id));
        }

        let mut seen = HashSet::with_capacity(answers.len());
        for answer in &answers {
            if answer.text.trim().is_empty() {
                return Err(QuestionError::EmptyAnswerText {
                    question: id,
                    answer: answer.id,
                });
            }
            if !seen.insert(answer.id) {
                return Err(QuestionError::DuplicateAnswer {
                    question: id,
                    answer: answer.id,
                });
            }
        }

        if !answers.iter().any(|a| a.correct) {
            return Err(QuestionError::NoCorrectAnswer(id));
        }

        Ok(Self {
            id,
            prompt,
            answers,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    /// Look up one of this question's answers.
    #[must_use]
    pub fn answer(&self, id: AnswerId) -> Option<&Answer> {
        self.answers.iter().find(|a| a.id == id)
    }

    pub fn correct_answers(&self) -> impl Iterator<Item = &Answer> {
        self.answers.iter().filter(|a| a.correct)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn answers() -> Vec<Answer> {
        vec![
            Answer::new(AnswerId::new(1), "Paris", true),
            Answer::new(AnswerId::new(2), "Lyon", false),
        ]
    }

    #[test]
    fn builds_valid_question() {
        let q = Question::new(QuestionId::new(1), "  Capital of France?  ", answers()).unwrap();
        assert_eq!(q.prompt(), "Capital of France?");
        assert_eq!(q.answers().len(), 2);
        assert_eq!(q.answer(AnswerId::new(2)).unwrap().text, "Lyon");
        assert!(q.answer(AnswerId::new(9)).is_none());
        assert_eq!(q.correct_answers().count(), 1);
    }

    #[test]
    fn rejects_blank_prompt() {
        let err = Question::new(QuestionId::new(1), "   ", answers()).unwrap_err();
        assert_eq!(err, QuestionError::EmptyPrompt(QuestionId::new(1)));
    }

    #[test]
    fn rejects_missing_answers() {
        let err = Question::new(QuestionId::new(1), "Q", Vec::new()).unwrap_err();
        assert_eq!(err, QuestionError::NoAnswers(QuestionId::new(1)));
    }

    #[test]
    fn rejects_duplicate_answer_ids() {
        let dup = vec![
            Answer::new(AnswerId::new(1), "a", true),
            Answer::new(AnswerId::new(1), "b", false),
        ];
        let err = Question::new(QuestionId::new(3), "Q", dup).unwrap_err();
        assert!(matches!(err, QuestionError::DuplicateAnswer { .. }));
    }

    #[test]
    fn rejects_blank_answer_text() {
        let blank = vec![Answer::new(AnswerId::new(1), " ", true)];
        let err = Question::new(QuestionId::new(3), "Q", blank).unwrap_err();
        assert!(matches!(err, QuestionError::EmptyAnswerText { .. }));
    }

    #[test]
    fn rejects_question_without_correct_answer() {
        let wrong = vec![
            Answer::new(AnswerId::new(1), "a", false),
            Answer::new(AnswerId::new(2), "b", false),
        ];
        let err = Question::new(QuestionId::new(5), "Q", wrong).unwrap_err();
        assert_eq!(err, QuestionError::NoCorrectAnswer(QuestionId::new(5)));
    }

    #[test]
    fn tolerates_multiple_correct_answers() {
        let multi = vec![
            Answer::new(AnswerId::new(1), "2", true),
            Answer::new(AnswerId::new(2), "two", true),
            Answer::new(AnswerId::new(3), "three", false),
        ];
        let q = Question::new(QuestionId::new(1), "1 + 1?", multi).unwrap();
        assert_eq!(q.correct_answers().count(), 2);
    }
}
