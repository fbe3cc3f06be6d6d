use quiz_core::model::ResultRecord;
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, map_result_row, ser, u64_to_i64};
use crate::repository::{ResultRepository, ResultRow, ResultStats, StorageError};

const RESULT_COLUMNS: &str = r"
    id, player_id, player_name, total_attempts, first_try_percentage,
    score, total_questions, passes, started_at, completed_at
";

impl SqliteRepository {
    async fn query_results(&self, order_by: &str, limit: u32) -> Result<Vec<ResultRow>, StorageError> {
        let sql = format!("SELECT {RESULT_COLUMNS} FROM results ORDER BY {order_by} LIMIT ?1");
        let rows = sqlx::query(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_result_row(&row)?);
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl ResultRepository for SqliteRepository {
    async fn append_result(&self, record: &ResultRecord) -> Result<i64, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO results (
                    player_id, player_name, total_attempts, first_try_percentage,
                    score, total_questions, passes, started_at, completed_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
        )
        .bind(u64_to_i64("player_id", record.player().id().value())?)
        .bind(record.player().name())
        .bind(i64::from(record.total_attempts()))
        .bind(i64::from(record.first_try_percentage()))
        .bind(i64::from(record.score()))
        .bind(i64::from(record.total_questions()))
        .bind(i64::from(record.passes()))
        .bind(record.started_at())
        .bind(record.completed_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.last_insert_rowid())
    }

    async fn get_result(&self, id: i64) -> Result<ResultRecord, StorageError> {
        let sql = format!("SELECT {RESULT_COLUMNS} FROM results WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;

        Ok(map_result_row(&row)?.record)
    }

    async fn list_results(&self, limit: u32) -> Result<Vec<ResultRow>, StorageError> {
        self.query_results("completed_at DESC, id DESC", limit).await
    }

    async fn leaderboard(&self, limit: u32) -> Result<Vec<ResultRow>, StorageError> {
        self.query_results(
            "first_try_percentage DESC, total_attempts ASC, completed_at ASC, id ASC",
            limit,
        )
        .await
    }

    async fn result_stats(&self) -> Result<ResultStats, StorageError> {
        let rows = sqlx::query("SELECT first_try_percentage, total_attempts FROM results")
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        let mut pairs = Vec::with_capacity(rows.len());
        for row in rows {
            let pct: i64 = row.try_get("first_try_percentage").map_err(ser)?;
            let attempts: i64 = row.try_get("total_attempts").map_err(ser)?;
            pairs.push((
                u8::try_from(pct).map_err(ser)?,
                u32::try_from(attempts).map_err(ser)?,
            ));
        }
        Ok(ResultStats::from_pairs(pairs))
    }
}
