use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{AnswersRepo, RepoError};
use crate::domain::entities::{AnswerRecord, AnswerView, AuthorRef};
use crate::domain::types::{ContentKind, VoteDirection};

use super::{PostgresRepositories, map_sqlx_error, score_sql};

const ANSWER_COLUMNS: &str = "id, question_id, author_id, body, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct AnswerRow {
    id: Uuid,
    question_id: Uuid,
    author_id: Uuid,
    body: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<AnswerRow> for AnswerRecord {
    fn from(row: AnswerRow) -> Self {
        Self {
            id: row.id,
            question_id: row.question_id,
            author_id: row.author_id,
            body: row.body,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AnswerViewRow {
    id: Uuid,
    question_id: Uuid,
    body: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    author_id: Uuid,
    author_username: String,
    author_display_name: String,
    score: i64,
    accepted: bool,
    viewer_vote: Option<VoteDirection>,
}

impl From<AnswerViewRow> for AnswerView {
    fn from(row: AnswerViewRow) -> Self {
        Self {
            id: row.id,
            question_id: row.question_id,
            author: AuthorRef {
                id: row.author_id,
                username: row.author_username,
                display_name: row.author_display_name,
            },
            body: row.body,
            score: row.score,
            accepted: row.accepted,
            viewer_vote: row.viewer_vote,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait::async_trait]
impl AnswersRepo for PostgresRepositories {
    async fn create_answer(
        &self,
        question_id: Uuid,
        author_id: Uuid,
        body: String,
    ) -> Result<AnswerRecord, RepoError> {
        let row: AnswerRow = sqlx::query_as(&format!(
            "INSERT INTO answers (id, question_id, author_id, body, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $5) RETURNING {ANSWER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(question_id)
        .bind(author_id)
        .bind(body)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn find_answer(&self, id: Uuid) -> Result<Option<AnswerRecord>, RepoError> {
        let row: Option<AnswerRow> =
            sqlx::query_as(&format!("SELECT {ANSWER_COLUMNS} FROM answers WHERE id = $1"))
                .bind(id)
                .fetch_optional(self.pool())
                .await
                .map_err(map_sqlx_error)?;
        Ok(row.map(Into::into))
    }

    async fn list_for_question(
        &self,
        question_id: Uuid,
        viewer_id: Option<Uuid>,
    ) -> Result<Vec<AnswerView>, RepoError> {
        let rows: Vec<AnswerViewRow> = sqlx::query_as(&format!(
            "SELECT a.id, a.question_id, a.body, a.created_at, a.updated_at, \
                    u.id AS author_id, u.username AS author_username, \
                    u.display_name AS author_display_name, \
                    {score} AS score, \
                    (q.accepted_answer_id IS NOT DISTINCT FROM a.id) AS accepted, \
                    (SELECT v.direction FROM votes v \
                     WHERE v.target_kind = 'answer' AND v.target_id = a.id AND v.user_id = $2) AS viewer_vote \
             FROM answers a \
             INNER JOIN users u ON u.id = a.author_id \
             INNER JOIN questions q ON q.id = a.question_id \
             WHERE a.question_id = $1 \
             ORDER BY accepted DESC, score DESC, a.created_at ASC, a.id ASC",
            score = score_sql("answer", "a.id"),
        ))
        .bind(question_id)
        .bind(viewer_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete_answer(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        Self::delete_dependents(&mut tx, ContentKind::Answer, &[id]).await?;
        sqlx::query("DELETE FROM answers WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)
    }
}
