use sqlx::{Postgres, QueryBuilder, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    AcceptedAnswerSwap, CreateQuestionParams, QuestionFilter, QuestionsRepo, RepoError,
    UpdateQuestionParams,
};
use crate::domain::entities::{AuthorRef, QuestionRecord, QuestionSummary};
use crate::domain::types::ContentKind;

use super::{PostgresRepositories, map_sqlx_error, score_sql};

const QUESTION_COLUMNS: &str = "id, author_id, community_id, title, body, views, \
     accepted_answer_id, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct QuestionRow {
    id: Uuid,
    author_id: Uuid,
    community_id: Option<Uuid>,
    title: String,
    body: String,
    views: i64,
    accepted_answer_id: Option<Uuid>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<QuestionRow> for QuestionRecord {
    fn from(row: QuestionRow) -> Self {
        Self {
            id: row.id,
            author_id: row.author_id,
            community_id: row.community_id,
            title: row.title,
            body: row.body,
            views: row.views,
            accepted_answer_id: row.accepted_answer_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct QuestionSummaryRow {
    id: Uuid,
    title: String,
    community_id: Option<Uuid>,
    views: i64,
    has_accepted_answer: bool,
    created_at: OffsetDateTime,
    author_id: Uuid,
    author_username: String,
    author_display_name: String,
    tags: Vec<String>,
    answer_count: i64,
    score: i64,
    last_activity_at: OffsetDateTime,
}

impl From<QuestionSummaryRow> for QuestionSummary {
    fn from(row: QuestionSummaryRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            author: AuthorRef {
                id: row.author_id,
                username: row.author_username,
                display_name: row.author_display_name,
            },
            community_id: row.community_id,
            tags: row.tags,
            views: row.views,
            score: row.score,
            answer_count: row.answer_count,
            has_accepted_answer: row.has_accepted_answer,
            created_at: row.created_at,
            last_activity_at: row.last_activity_at,
        }
    }
}

impl PostgresRepositories {
    /// Upsert each tag by name and link it to the question.
    async fn attach_tags(
        tx: &mut Transaction<'_, Postgres>,
        question_id: Uuid,
        tags: &[String],
    ) -> Result<(), RepoError> {
        let now = OffsetDateTime::now_utc();
        for name in tags {
            let tag_id: Uuid = sqlx::query_scalar(
                "INSERT INTO tags (id, name, created_at) VALUES ($1, $2, $3) \
                 ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name \
                 RETURNING id",
            )
            .bind(Uuid::new_v4())
            .bind(name)
            .bind(now)
            .fetch_one(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

            sqlx::query(
                "INSERT INTO question_tags (question_id, tag_id) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(question_id)
            .bind(tag_id)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl QuestionsRepo for PostgresRepositories {
    async fn create_question(
        &self,
        params: CreateQuestionParams,
    ) -> Result<QuestionRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        let now = OffsetDateTime::now_utc();

        let row: QuestionRow = sqlx::query_as(&format!(
            "INSERT INTO questions (id, author_id, community_id, title, body, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $6) RETURNING {QUESTION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(params.author_id)
        .bind(params.community_id)
        .bind(&params.title)
        .bind(&params.body)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        Self::attach_tags(&mut tx, row.id, &params.tags).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn find_question(&self, id: Uuid) -> Result<Option<QuestionRecord>, RepoError> {
        let row: Option<QuestionRow> = sqlx::query_as(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.map(Into::into))
    }

    async fn question_tags(&self, id: Uuid) -> Result<Vec<String>, RepoError> {
        sqlx::query_scalar(
            "SELECT t.name FROM question_tags qt INNER JOIN tags t ON t.id = qt.tag_id \
             WHERE qt.question_id = $1 ORDER BY t.name",
        )
        .bind(id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn list_summaries(
        &self,
        filter: &QuestionFilter,
    ) -> Result<Vec<QuestionSummary>, RepoError> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
            "SELECT q.id, q.title, q.community_id, q.views, \
                    q.accepted_answer_id IS NOT NULL AS has_accepted_answer, q.created_at, \
                    u.id AS author_id, u.username AS author_username, \
                    u.display_name AS author_display_name, \
                    ARRAY(SELECT t.name FROM question_tags qt INNER JOIN tags t ON t.id = qt.tag_id \
                          WHERE qt.question_id = q.id ORDER BY t.name) AS tags, \
                    (SELECT COUNT(*) FROM answers a WHERE a.question_id = q.id) AS answer_count, \
                    {score} AS score, \
                    GREATEST(q.created_at, \
                             COALESCE((SELECT MAX(a.created_at) FROM answers a WHERE a.question_id = q.id), \
                                      q.created_at)) AS last_activity_at \
             FROM questions q INNER JOIN users u ON u.id = q.author_id WHERE TRUE",
            score = score_sql("question", "q.id"),
        ));

        if let Some(community_id) = filter.community_id {
            qb.push(" AND q.community_id = ");
            qb.push_bind(community_id);
        }
        if let Some(tag) = filter.tag.as_ref() {
            qb.push(
                " AND EXISTS (SELECT 1 FROM question_tags qt INNER JOIN tags t ON t.id = qt.tag_id \
                 WHERE qt.question_id = q.id AND t.name = ",
            );
            qb.push_bind(tag.clone());
            qb.push(")");
        }
        if let Some(search) = filter.search.as_deref() {
            Self::push_search(&mut qb, &["q.title", "q.body"], search);
        }

        let rows: Vec<QuestionSummaryRow> = qb
            .build_query_as::<QuestionSummaryRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_question(
        &self,
        params: UpdateQuestionParams,
    ) -> Result<QuestionRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let row: QuestionRow = sqlx::query_as(&format!(
            "UPDATE questions SET title = $2, body = $3, updated_at = $4 \
             WHERE id = $1 RETURNING {QUESTION_COLUMNS}"
        ))
        .bind(params.id)
        .bind(&params.title)
        .bind(&params.body)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        if let Some(tags) = params.tags.as_deref() {
            sqlx::query("DELETE FROM question_tags WHERE question_id = $1")
                .bind(params.id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            Self::attach_tags(&mut tx, params.id, tags).await?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn delete_question(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let answer_ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT id FROM answers WHERE question_id = $1")
                .bind(id)
                .fetch_all(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        Self::delete_dependents(&mut tx, ContentKind::Answer, &answer_ids).await?;
        Self::delete_dependents(&mut tx, ContentKind::Question, &[id]).await?;

        sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn record_view(&self, question_id: Uuid, viewer_id: Uuid) -> Result<bool, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let inserted = sqlx::query(
            "INSERT INTO question_views (question_id, viewer_id, viewed_at) VALUES ($1, $2, $3) \
             ON CONFLICT DO NOTHING",
        )
        .bind(question_id)
        .bind(viewer_id)
        .bind(OffsetDateTime::now_utc())
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .rows_affected()
            == 1;

        if inserted {
            sqlx::query("UPDATE questions SET views = views + 1 WHERE id = $1")
                .bind(question_id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(inserted)
    }

    async fn swap_accepted_answer(&self, swap: AcceptedAnswerSwap) -> Result<bool, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let swapped = sqlx::query(
            "UPDATE questions SET accepted_answer_id = $3 \
             WHERE id = $1 AND accepted_answer_id IS NOT DISTINCT FROM $2",
        )
        .bind(swap.question_id)
        .bind(swap.expected)
        .bind(swap.accepted)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .rows_affected()
            == 1;
        if !swapped {
            return Ok(false);
        }

        for (user_id, delta) in swap.reputation_deltas() {
            Self::shift_reputation(&mut *tx, user_id, delta).await?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(true)
    }
}
