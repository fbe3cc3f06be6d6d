use std::sync::Arc;

use quiz_core::model::{AnswerId, Player, ResultRecord};
use quiz_core::{Advance, QuizSession, SubmitOutcome};
use storage::repository::{QuestionRepository, ResultRepository};
use tracing::{info, warn};

use super::plan::SessionPlan;
use super::view::ResultId;
use crate::Clock;
use crate::error::QuizError;

/// Result of answering the current question in a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizAnswerResult {
    pub outcome: SubmitOutcome,
    pub is_finished: bool,
    /// Storage id of the persisted result once the session has finished.
    pub result_id: Option<ResultId>,
}

/// Orchestrates session start and persisted answering.
#[derive(Clone)]
pub struct QuizLoopService {
    clock: Clock,
    questions: Arc<dyn QuestionRepository>,
    results: Arc<dyn ResultRepository>,
    shuffle: bool,
}

impl QuizLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        questions: Arc<dyn QuestionRepository>,
        results: Arc<dyn ResultRepository>,
    ) -> Self {
        Self {
            clock,
            questions,
            results,
            shuffle: false,
        }
    }

    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Start a new session over the stored catalog.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Session` with `EmptyCatalog` when no questions are
    /// stored, or `QuizError::Storage` when the catalog cannot be loaded.
    pub async fn start_session(&self, player: Player) -> Result<QuizSession, QuizError> {
        let catalog = self.questions.load_catalog().await?;
        let catalog = SessionPlan::new(self.shuffle)
            .order(catalog)
            .map_err(quiz_core::Error::from)?;
        let session = QuizSession::new(player, catalog)?.with_clock(self.clock);
        info!(
            player = %session.player().id(),
            questions = session.total_questions(),
            shuffle = self.shuffle,
            "quiz session started"
        );
        Ok(session)
    }

    /// Answer the current question and persist the result once the session finishes.
    ///
    /// The result sink is called exactly once, on the answer that finishes the
    /// session.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Session` when the engine rejects the answer; session
    /// state is unchanged in that case. Returns `QuizError::Persist` when the
    /// session finished but the sink failed. The session stays finished and the
    /// error carries the record for `finalize_result`.
    pub async fn answer_current(
        &self,
        session: &mut QuizSession,
        answer_id: AnswerId,
    ) -> Result<QuizAnswerResult, QuizError> {
        let outcome = session.submit_answer(answer_id)?;
        let is_finished = outcome.is_finished();

        let result_id = match &outcome.next {
            Advance::Finished(record) => Some(self.persist(record).await?),
            _ => None,
        };

        Ok(QuizAnswerResult {
            outcome,
            is_finished,
            result_id,
        })
    }

    /// Retry result persistence after `answer_current` returned `QuizError::Persist`.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Persist` with the record again if the sink still fails.
    pub async fn finalize_result(&self, record: ResultRecord) -> Result<ResultId, QuizError> {
        self.persist(&record).await
    }

    async fn persist(&self, record: &ResultRecord) -> Result<ResultId, QuizError> {
        match self.results.append_result(record).await {
            Ok(id) => {
                info!(
                    result_id = id,
                    player = %record.player().id(),
                    score = record.score(),
                    total_attempts = record.total_attempts(),
                    first_try_percentage = record.first_try_percentage(),
                    "quiz session finished"
                );
                Ok(id)
            }
            Err(source) => {
                warn!(
                    player = %record.player().id(),
                    error = %source,
                    "failed to persist quiz result"
                );
                Err(QuizError::Persist {
                    record: Box::new(record.clone()),
                    source,
                })
            }
        }
    }
}
