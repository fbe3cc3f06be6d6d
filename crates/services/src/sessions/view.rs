use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use quiz_core::model::{PlayerId, ResultRecord};
use storage::repository::{ResultRepository, ResultRow, ResultStats};

use crate::error::QuizError;

/// Storage identifier for a persisted result.
///
/// NOTE: This is `i64` to match `SQLite` row IDs.
pub type ResultId = i64;

/// Presentation-agnostic list item for a finished session.
///
/// No pre-formatted strings; the caller formats timestamps and durations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultListItem {
    pub id: ResultId,
    pub player_id: PlayerId,
    pub player_name: String,
    pub score: u32,
    pub total_questions: u32,
    pub total_attempts: u32,
    pub first_try_percentage: u8,
    pub passes: u32,
    pub completed_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl ResultListItem {
    #[must_use]
    pub fn from_record(id: ResultId, record: &ResultRecord) -> Self {
        Self {
            id,
            player_id: record.player().id(),
            player_name: record.player().name().to_owned(),
            score: record.score(),
            total_questions: record.total_questions(),
            total_attempts: record.total_attempts(),
            first_try_percentage: record.first_try_percentage(),
            passes: record.passes(),
            completed_at: record.completed_at(),
            elapsed: record.elapsed(),
        }
    }

    fn from_row(row: &ResultRow) -> Self {
        Self::from_record(row.id, &row.record)
    }
}

/// A ranked result. `rank` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub item: ResultListItem,
}

/// Totals across every stored session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GlobalStats {
    pub sessions: u64,
    pub total_attempts: u64,
    pub average_first_try_percentage: u8,
}

impl From<ResultStats> for GlobalStats {
    fn from(stats: ResultStats) -> Self {
        Self {
            sessions: stats.sessions,
            total_attempts: stats.total_attempts,
            average_first_try_percentage: stats.average_first_try_percentage,
        }
    }
}

/// Read-side facade over stored results.
#[derive(Clone)]
pub struct ResultService {
    results: Arc<dyn ResultRepository>,
}

impl ResultService {
    #[must_use]
    pub fn new(results: Arc<dyn ResultRepository>) -> Self {
        Self { results }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(storage::repository::InMemoryRepository::new()))
    }

    /// Most recent results first.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Storage` on repository failures.
    pub async fn recent_results(&self, limit: u32) -> Result<Vec<ResultListItem>, QuizError> {
        let rows = self.results.list_results(limit).await?;
        Ok(rows.iter().map(ResultListItem::from_row).collect())
    }

    /// Best results first, ranked from 1.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Storage` on repository failures.
    pub async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, QuizError> {
        let rows = self.results.leaderboard(limit).await?;
        Ok((1_u32..)
            .zip(rows.iter())
            .map(|(rank, row)| LeaderboardEntry {
                rank,
                item: ResultListItem::from_row(row),
            })
            .collect())
    }

    /// # Errors
    ///
    /// Returns `QuizError::Storage` on repository failures.
    pub async fn global_stats(&self) -> Result<GlobalStats, QuizError> {
        Ok(self.results.result_stats().await?.into())
    }
}
