use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::model::ids::PlayerId;
use crate::stats::SessionStats;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResultRecordError {
    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error("first-try percentage out of range: {0}")]
    InvalidPercentage(u8),

    #[error("score ({score}) exceeds question count ({total})")]
    ScoreOutOfRange { score: u32, total: u32 },

    #[error("player name cannot be empty")]
    EmptyPlayerName,
}

/// The learner a session belongs to.
///
/// Passed in explicitly; the engine never reads identity from ambient state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    id: PlayerId,
    name: String,
}

impl Player {
    /// # Errors
    ///
    /// Returns `ResultRecordError::EmptyPlayerName` if `name` is blank.
    pub fn new(id: PlayerId, name: impl Into<String>) -> Result<Self, ResultRecordError> {
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(ResultRecordError::EmptyPlayerName);
        }
        Ok(Self { id, name })
    }

    #[must_use]
    pub fn anonymous(id: PlayerId) -> Self {
        Self {
            id,
            name: "Anonymous".to_owned(),
        }
    }

    #[must_use]
    pub fn id(&self) -> PlayerId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Finished-session record handed to the result sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    player: Player,
    total_attempts: u32,
    first_try_percentage: u8,
    score: u32,
    total_questions: u32,
    passes: u32,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
}

impl ResultRecord {
    /// Rehydrate a result from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `ResultRecordError` if the time range, percentage or score is inconsistent.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        player: Player,
        total_attempts: u32,
        first_try_percentage: u8,
        score: u32,
        total_questions: u32,
        passes: u32,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Result<Self, ResultRecordError> {
        if completed_at < started_at {
            return Err(ResultRecordError::InvalidTimeRange);
        }
        if first_try_percentage > 100 {
            return Err(ResultRecordError::InvalidPercentage(first_try_percentage));
        }
        if score > total_questions {
            return Err(ResultRecordError::ScoreOutOfRange {
                score,
                total: total_questions,
            });
        }

        Ok(Self {
            player,
            total_attempts,
            first_try_percentage,
            score,
            total_questions,
            passes,
            started_at,
            completed_at,
        })
    }

    /// Build the record at the moment a session finishes.
    ///
    /// The engine guarantees `score <= total_questions`; a clock that moved
    /// backwards is clamped to `started_at`.
    pub(crate) fn for_finished_session(
        player: Player,
        stats: &SessionStats,
        score: u32,
        passes: u32,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            player,
            total_attempts: stats.total_attempts,
            first_try_percentage: stats.first_try_percentage.min(100),
            score: score.min(stats.total_questions),
            total_questions: stats.total_questions,
            passes,
            started_at,
            completed_at: completed_at.max(started_at),
        }
    }

    #[must_use]
    pub fn player(&self) -> &Player {
        &self.player
    }

    #[must_use]
    pub fn total_attempts(&self) -> u32 {
        self.total_attempts
    }

    #[must_use]
    pub fn first_try_percentage(&self) -> u8 {
        self.first_try_percentage
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn passes(&self) -> u32 {
        self.passes
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    /// Wall-clock time spent in the session.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.completed_at - self.started_at
    }
}
