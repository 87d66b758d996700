use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{RepoError, TagsRepo};
use crate::domain::entities::{TagRecord, TagUsage};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(Debug, sqlx::FromRow)]
struct TagRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    created_at: OffsetDateTime,
}

impl From<TagRow> for TagRecord {
    fn from(row: TagRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TagUsageRow {
    name: String,
    description: Option<String>,
    question_count: i64,
}

#[async_trait::async_trait]
impl TagsRepo for PostgresRepositories {
    async fn list_usage(&self, search: Option<&str>) -> Result<Vec<TagUsage>, RepoError> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "SELECT t.name, t.description, COUNT(qt.question_id) AS question_count \
             FROM tags t LEFT JOIN question_tags qt ON qt.tag_id = t.id WHERE TRUE",
        );
        if let Some(search) = search {
            Self::push_search(&mut qb, &["t.name"], search);
        }
        qb.push(" GROUP BY t.id ORDER BY question_count DESC, t.name ASC");

        let rows: Vec<TagUsageRow> = qb
            .build_query_as::<TagUsageRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| TagUsage {
                name: row.name,
                description: row.description,
                question_count: row.question_count,
            })
            .collect())
    }

    async fn find_tag(&self, name: &str) -> Result<Option<TagRecord>, RepoError> {
        let row: Option<TagRow> =
            sqlx::query_as("SELECT id, name, description, created_at FROM tags WHERE name = $1")
                .bind(name)
                .fetch_optional(self.pool())
                .await
                .map_err(map_sqlx_error)?;
        Ok(row.map(Into::into))
    }
}
