use std::collections::HashMap;

use quiz_core::model::{Answer, Catalog, Question, QuestionId};
use sqlx::{Row, Sqlite, Transaction};
use tracing::debug;

use super::SqliteRepository;
use super::mapping::{answer_id_from_i64, conn, question_id_from_i64, ser, u64_to_i64};
use crate::repository::{QuestionRepository, StorageError};

async fn write_question(
    tx: &mut Transaction<'_, Sqlite>,
    position: u32,
    question: &Question,
) -> Result<(), StorageError> {
    let question_id = u64_to_i64("question_id", question.id().value())?;

    sqlx::query(
        r"
        INSERT INTO questions (id, position, prompt)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(id) DO UPDATE SET
            position = excluded.position,
            prompt = excluded.prompt
        ",
    )
    .bind(question_id)
    .bind(i64::from(position))
    .bind(question.prompt())
    .execute(&mut **tx)
    .await
    .map_err(conn)?;

    // Answers are replaced wholesale so removed answers do not linger.
    sqlx::query("DELETE FROM answers WHERE question_id = ?1")
        .bind(question_id)
        .execute(&mut **tx)
        .await
        .map_err(conn)?;

    for (answer_position, answer) in (0_i64..).zip(question.answers()) {
        sqlx::query(
            r"
            INSERT INTO answers (id, question_id, position, text, is_correct)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(u64_to_i64("answer_id", answer.id.value())?)
        .bind(question_id)
        .bind(answer_position)
        .bind(answer.text.as_str())
        .bind(answer.correct)
        .execute(&mut **tx)
        .await
        .map_err(conn)?;
    }

    Ok(())
}

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn upsert_question(&self, position: u32, question: &Question) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;
        write_question(&mut tx, position, question).await?;
        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn replace_catalog(&self, catalog: &Catalog) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query("DELETE FROM answers")
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        sqlx::query("DELETE FROM questions")
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for (position, question) in (1_u32..).zip(catalog.questions()) {
            write_question(&mut tx, position, question).await?;
        }

        tx.commit().await.map_err(conn)?;
        debug!(questions = catalog.len(), "catalog replaced");
        Ok(())
    }

    async fn load_catalog(&self) -> Result<Catalog, StorageError> {
        let question_rows = sqlx::query(
            r"
            SELECT id, prompt
            FROM questions
            ORDER BY position ASC, id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let answer_rows = sqlx::query(
            r"
            SELECT id, question_id, text, is_correct
            FROM answers
            ORDER BY question_id ASC, position ASC, id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut answers: HashMap<QuestionId, Vec<Answer>> = HashMap::new();
        for row in answer_rows {
            let question_id =
                question_id_from_i64(row.try_get::<i64, _>("question_id").map_err(ser)?)?;
            let answer = Answer::new(
                answer_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
                row.try_get::<String, _>("text").map_err(ser)?,
                row.try_get::<bool, _>("is_correct").map_err(ser)?,
            );
            answers.entry(question_id).or_default().push(answer);
        }

        let mut questions = Vec::with_capacity(question_rows.len());
        for row in question_rows {
            let id = question_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?;
            let prompt: String = row.try_get("prompt").map_err(ser)?;
            let question =
                Question::new(id, prompt, answers.remove(&id).unwrap_or_default()).map_err(ser)?;
            questions.push(question);
        }

        Catalog::new(questions).map_err(ser)
    }
}
