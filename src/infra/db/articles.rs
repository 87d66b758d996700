use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    ArticleFilter, ArticlesRepo, CreateArticleParams, RepoError, UpdateArticleParams,
};
use crate::domain::entities::{ArticleRecord, ArticleSummary, AuthorRef};
use crate::domain::types::ContentKind;

use super::{PostgresRepositories, map_sqlx_error, score_sql};

const ARTICLE_COLUMNS: &str = "id, author_id, community_id, title, body, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct ArticleRow {
    id: Uuid,
    author_id: Uuid,
    community_id: Option<Uuid>,
    title: String,
    body: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<ArticleRow> for ArticleRecord {
    fn from(row: ArticleRow) -> Self {
        Self {
            id: row.id,
            author_id: row.author_id,
            community_id: row.community_id,
            title: row.title,
            body: row.body,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ArticleSummaryRow {
    id: Uuid,
    title: String,
    community_id: Option<Uuid>,
    created_at: OffsetDateTime,
    author_id: Uuid,
    author_username: String,
    author_display_name: String,
    score: i64,
    comment_count: i64,
}

impl From<ArticleSummaryRow> for ArticleSummary {
    fn from(row: ArticleSummaryRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            author: AuthorRef {
                id: row.author_id,
                username: row.author_username,
                display_name: row.author_display_name,
            },
            community_id: row.community_id,
            score: row.score,
            comment_count: row.comment_count,
            created_at: row.created_at,
        }
    }
}

#[async_trait::async_trait]
impl ArticlesRepo for PostgresRepositories {
    async fn create_article(
        &self,
        params: CreateArticleParams,
    ) -> Result<ArticleRecord, RepoError> {
        let row: ArticleRow = sqlx::query_as(&format!(
            "INSERT INTO articles (id, author_id, community_id, title, body, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $6) RETURNING {ARTICLE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(params.author_id)
        .bind(params.community_id)
        .bind(&params.title)
        .bind(&params.body)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn find_article(&self, id: Uuid) -> Result<Option<ArticleRecord>, RepoError> {
        let row: Option<ArticleRow> =
            sqlx::query_as(&format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = $1"))
                .bind(id)
                .fetch_optional(self.pool())
                .await
                .map_err(map_sqlx_error)?;
        Ok(row.map(Into::into))
    }

    async fn list_summaries(
        &self,
        filter: &ArticleFilter,
    ) -> Result<Vec<ArticleSummary>, RepoError> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
            "SELECT a.id, a.title, a.community_id, a.created_at, \
                    u.id AS author_id, u.username AS author_username, \
                    u.display_name AS author_display_name, \
                    {score} AS score, \
                    (SELECT COUNT(*) FROM comments c \
                     WHERE c.target_kind = 'article' AND c.target_id = a.id) AS comment_count \
             FROM articles a INNER JOIN users u ON u.id = a.author_id WHERE TRUE",
            score = score_sql("article", "a.id"),
        ));
        if let Some(community_id) = filter.community_id {
            qb.push(" AND a.community_id = ");
            qb.push_bind(community_id);
        }
        if let Some(search) = filter.search.as_deref() {
            Self::push_search(&mut qb, &["a.title", "a.body"], search);
        }
        qb.push(" ORDER BY a.created_at DESC, a.id DESC");

        let rows: Vec<ArticleSummaryRow> = qb
            .build_query_as::<ArticleSummaryRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_article(
        &self,
        params: UpdateArticleParams,
    ) -> Result<ArticleRecord, RepoError> {
        let row: ArticleRow = sqlx::query_as(&format!(
            "UPDATE articles SET title = $2, body = $3, updated_at = $4 \
             WHERE id = $1 RETURNING {ARTICLE_COLUMNS}"
        ))
        .bind(params.id)
        .bind(&params.title)
        .bind(&params.body)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn delete_article(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        Self::delete_dependents(&mut tx, ContentKind::Article, &[id]).await?;
        sqlx::query("DELETE FROM articles WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)
    }
}
