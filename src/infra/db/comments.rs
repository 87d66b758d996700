use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{CommentsRepo, RepoError};
use crate::domain::entities::{AuthorRef, CommentRecord, CommentView};
use crate::domain::types::ContentKind;

use super::{PostgresRepositories, map_sqlx_error, score_sql};

const COMMENT_COLUMNS: &str = "id, target_kind, target_id, author_id, body, created_at";

#[derive(Debug, sqlx::FromRow)]
struct CommentRow {
    id: Uuid,
    target_kind: ContentKind,
    target_id: Uuid,
    author_id: Uuid,
    body: String,
    created_at: OffsetDateTime,
}

impl From<CommentRow> for CommentRecord {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            target_kind: row.target_kind,
            target_id: row.target_id,
            author_id: row.author_id,
            body: row.body,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CommentViewRow {
    id: Uuid,
    target_kind: ContentKind,
    target_id: Uuid,
    body: String,
    created_at: OffsetDateTime,
    author_id: Uuid,
    author_username: String,
    author_display_name: String,
    score: i64,
}

impl From<CommentViewRow> for CommentView {
    fn from(row: CommentViewRow) -> Self {
        Self {
            id: row.id,
            target_kind: row.target_kind,
            target_id: row.target_id,
            author: AuthorRef {
                id: row.author_id,
                username: row.author_username,
                display_name: row.author_display_name,
            },
            body: row.body,
            score: row.score,
            created_at: row.created_at,
        }
    }
}

#[async_trait::async_trait]
impl CommentsRepo for PostgresRepositories {
    async fn create_comment(
        &self,
        target_kind: ContentKind,
        target_id: Uuid,
        author_id: Uuid,
        body: String,
    ) -> Result<CommentRecord, RepoError> {
        let row: CommentRow = sqlx::query_as(&format!(
            "INSERT INTO comments (id, target_kind, target_id, author_id, body, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(target_kind)
        .bind(target_id)
        .bind(author_id)
        .bind(body)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn find_comment(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError> {
        let row: Option<CommentRow> =
            sqlx::query_as(&format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1"))
                .bind(id)
                .fetch_optional(self.pool())
                .await
                .map_err(map_sqlx_error)?;
        Ok(row.map(Into::into))
    }

    async fn list_for_target(
        &self,
        target_kind: ContentKind,
        target_id: Uuid,
    ) -> Result<Vec<CommentView>, RepoError> {
        let rows: Vec<CommentViewRow> = sqlx::query_as(&format!(
            "SELECT c.id, c.target_kind, c.target_id, c.body, c.created_at, \
                    u.id AS author_id, u.username AS author_username, \
                    u.display_name AS author_display_name, \
                    {score} AS score \
             FROM comments c INNER JOIN users u ON u.id = c.author_id \
             WHERE c.target_kind = $1 AND c.target_id = $2 \
             ORDER BY c.created_at ASC, c.id ASC",
            score = score_sql("comment", "c.id"),
        ))
        .bind(target_kind)
        .bind(target_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete_comment(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        Self::delete_dependents(&mut tx, ContentKind::Comment, &[id]).await?;
        sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)
    }
}
