use async_trait::async_trait;
use quiz_core::model::{Catalog, Question, QuestionId, ResultRecord};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A persisted result with its storage id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub id: i64,
    pub record: ResultRecord,
}

impl ResultRow {
    #[must_use]
    pub fn new(id: i64, record: ResultRecord) -> Self {
        Self { id, record }
    }
}

/// Totals across every stored result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResultStats {
    pub sessions: u64,
    pub total_attempts: u64,
    /// Mean first-try percentage, rounded half up. 0 when nothing is stored.
    pub average_first_try_percentage: u8,
}

impl ResultStats {
    /// Fold stats from `(first_try_percentage, total_attempts)` pairs.
    #[must_use]
    pub fn from_pairs(pairs: impl IntoIterator<Item = (u8, u32)>) -> Self {
        let mut sessions = 0_u64;
        let mut total_attempts = 0_u64;
        let mut percent_sum = 0_u64;
        for (pct, attempts) in pairs {
            sessions += 1;
            total_attempts += u64::from(attempts);
            percent_sum += u64::from(pct);
        }
        let average = if sessions == 0 {
            0
        } else {
            (percent_sum * 2 + sessions) / (sessions * 2)
        };
        Self {
            sessions,
            total_attempts,
            average_first_try_percentage: u8::try_from(average).unwrap_or(100),
        }
    }
}

/// Source of the question catalog.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Persist or replace a question and its answers at `position` in the catalog.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn upsert_question(&self, position: u32, question: &Question) -> Result<(), StorageError>;

    /// Replace every stored question with `catalog`, keeping its order.
    ///
    /// Questions missing from `catalog` are removed, so a smaller catalog
    /// never leaves stale questions behind.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the catalog cannot be stored. Nothing changes
    /// in that case.
    async fn replace_catalog(&self, catalog: &Catalog) -> Result<(), StorageError>;

    /// Load every question, ordered by position then id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if stored rows no longer form a valid
    /// catalog, or other storage errors.
    async fn load_catalog(&self) -> Result<Catalog, StorageError>;
}

/// Sink for finished-session records.
#[async_trait]
pub trait ResultRepository: Send + Sync {
    /// Append a finished-session record, returning its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn append_result(&self, record: &ResultRecord) -> Result<i64, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no result has this id.
    async fn get_result(&self, id: i64) -> Result<ResultRecord, StorageError>;

    /// Most recent results first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_results(&self, limit: u32) -> Result<Vec<ResultRow>, StorageError>;

    /// Best results first: highest first-try percentage, then fewest attempts,
    /// then earliest completion.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn leaderboard(&self, limit: u32) -> Result<Vec<ResultRow>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn result_stats(&self) -> Result<ResultStats, StorageError>;
}

fn limit_usize(limit: u32) -> usize {
    usize::try_from(limit).unwrap_or(usize::MAX)
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    questions: Arc<Mutex<HashMap<QuestionId, (u32, Question)>>>,
    results: Arc<Mutex<Vec<ResultRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&self) -> Result<Vec<ResultRow>, StorageError> {
        let guard = self
            .results
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .iter()
            .zip(1_i64..)
            .map(|(record, id)| ResultRow::new(id, record.clone()))
            .collect())
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn upsert_question(&self, position: u32, question: &Question) -> Result<(), StorageError> {
        let mut guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(question.id(), (position, question.clone()));
        Ok(())
    }

    async fn replace_catalog(&self, catalog: &Catalog) -> Result<(), StorageError> {
        let mut guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = (1_u32..)
            .zip(catalog.questions())
            .map(|(position, q)| (q.id(), (position, q.clone())))
            .collect();
        Ok(())
    }

    async fn load_catalog(&self) -> Result<Catalog, StorageError> {
        let guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut entries: Vec<_> = guard.values().cloned().collect();
        entries.sort_by_key(|(position, q)| (*position, q.id()));
        Catalog::new(entries.into_iter().map(|(_, q)| q).collect())
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl ResultRepository for InMemoryRepository {
    async fn append_result(&self, record: &ResultRecord) -> Result<i64, StorageError> {
        let mut guard = self
            .results
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.push(record.clone());
        i64::try_from(guard.len()).map_err(|_| StorageError::Conflict)
    }

    async fn get_result(&self, id: i64) -> Result<ResultRecord, StorageError> {
        let guard = self
            .results
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let idx = id
            .checked_sub(1)
            .and_then(|i| usize::try_from(i).ok())
            .ok_or(StorageError::NotFound)?;
        guard.get(idx).cloned().ok_or(StorageError::NotFound)
    }

    async fn list_results(&self, limit: u32) -> Result<Vec<ResultRow>, StorageError> {
        let mut rows = self.rows()?;
        rows.sort_by(|a, b| {
            b.record
                .completed_at()
                .cmp(&a.record.completed_at())
                .then(b.id.cmp(&a.id))
        });
        rows.truncate(limit_usize(limit));
        Ok(rows)
    }

    async fn leaderboard(&self, limit: u32) -> Result<Vec<ResultRow>, StorageError> {
        let mut rows = self.rows()?;
        rows.sort_by(|a, b| {
            b.record
                .first_try_percentage()
                .cmp(&a.record.first_try_percentage())
                .then(a.record.total_attempts().cmp(&b.record.total_attempts()))
                .then(a.record.completed_at().cmp(&b.record.completed_at()))
                .then(a.id.cmp(&b.id))
        });
        rows.truncate(limit_usize(limit));
        Ok(rows)
    }

    async fn result_stats(&self) -> Result<ResultStats, StorageError> {
        let guard = self
            .results
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(ResultStats::from_pairs(
            guard
                .iter()
                .map(|r| (r.first_try_percentage(), r.total_attempts())),
        ))
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionRepository>,
    pub results: Arc<dyn ResultRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let questions: Arc<dyn QuestionRepository> = Arc::new(repo.clone());
        let results: Arc<dyn ResultRepository> = Arc::new(repo);
        Self { questions, results }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use quiz_core::model::{Answer, AnswerId, Player, PlayerId};
    use quiz_core::time::fixed_now;

    fn build_question(id: u64) -> Question {
        Question::new(
            QuestionId::new(id),
            format!("Q{id}"),
            vec![
                Answer::new(AnswerId::new(1), "yes", true),
                Answer::new(AnswerId::new(2), "no", false),
            ],
        )
        .unwrap()
    }

    fn build_result(player: u64, pct: u8, attempts: u32, minutes: i64) -> ResultRecord {
        let started = fixed_now() + Duration::minutes(minutes);
        ResultRecord::from_persisted(
            Player::anonymous(PlayerId::new(player)),
            attempts,
            pct,
            2,
            2,
            1,
            started,
            started + Duration::minutes(1),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn catalog_is_ordered_by_position() {
        let repo = InMemoryRepository::new();
        repo.upsert_question(2, &build_question(10)).await.unwrap();
        repo.upsert_question(1, &build_question(20)).await.unwrap();
        repo.upsert_question(2, &build_question(5)).await.unwrap();

        let catalog = repo.load_catalog().await.unwrap();
        let ids: Vec<_> = catalog.questions().iter().map(|q| q.id().value()).collect();
        assert_eq!(ids, vec![20, 5, 10]);
    }

    #[tokio::test]
    async fn upsert_replaces_existing_question() {
        let repo = InMemoryRepository::new();
        repo.upsert_question(1, &build_question(1)).await.unwrap();
        repo.upsert_question(3, &build_question(1)).await.unwrap();
        assert_eq!(repo.load_catalog().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn results_round_trip_and_rank() {
        let repo = InMemoryRepository::new();
        let a = repo.append_result(&build_result(1, 50, 3, 0)).await.unwrap();
        let b = repo.append_result(&build_result(2, 100, 2, 1)).await.unwrap();
        let c = repo.append_result(&build_result(3, 50, 2, 2)).await.unwrap();
        assert_eq!((a, b, c), (1, 2, 3));

        assert_eq!(repo.get_result(b).await.unwrap().first_try_percentage(), 100);
        assert!(matches!(repo.get_result(9).await, Err(StorageError::NotFound)));

        let recent: Vec<_> = repo.list_results(2).await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(recent, vec![3, 2]);

        let board: Vec<_> = repo.leaderboard(10).await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(board, vec![2, 3, 1]);

        let stats = repo.result_stats().await.unwrap();
        assert_eq!(stats.sessions, 3);
        assert_eq!(stats.total_attempts, 7);
        assert_eq!(stats.average_first_try_percentage, 67);
    }

    #[tokio::test]
    async fn replace_catalog_drops_missing_questions() {
        let repo = InMemoryRepository::new();
        for id in 1..=3 {
            repo.upsert_question(u32::try_from(id).unwrap(), &build_question(id))
                .await
                .unwrap();
        }

        let smaller = Catalog::new(vec![build_question(3), build_question(1)]).unwrap();
        repo.replace_catalog(&smaller).await.unwrap();

        let catalog = repo.load_catalog().await.unwrap();
        let ids: Vec<_> = catalog.questions().iter().map(|q| q.id().value()).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[tokio::test]
    async fn out_of_range_result_ids_are_not_found() {
        let repo = InMemoryRepository::new();
        repo.append_result(&build_result(1, 100, 1, 0)).await.unwrap();

        for id in [i64::MIN, -1, 0, 2] {
            assert!(
                matches!(repo.get_result(id).await, Err(StorageError::NotFound)),
                "id {id}"
            );
        }
        assert!(repo.get_result(1).await.is_ok());
    }

    #[test]
    fn empty_stats_are_zero() {
        assert_eq!(ResultStats::from_pairs([]), ResultStats::default());
    }
}
