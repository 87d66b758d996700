use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{CommunitiesRepo, CreateCommunityParams, RepoError};
use crate::domain::entities::{
    AuthorRef, CommunityCounts, CommunityMember, CommunityRecord, CommunitySummary,
};

use super::{PostgresRepositories, map_sqlx_error};

const COMMUNITY_COLUMNS: &str = "id, slug, name, description, owner_id, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct CommunityRow {
    id: Uuid,
    slug: String,
    name: String,
    description: String,
    owner_id: Uuid,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<CommunityRow> for CommunityRecord {
    fn from(row: CommunityRow) -> Self {
        Self {
            id: row.id,
            slug: row.slug,
            name: row.name,
            description: row.description,
            owner_id: row.owner_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CommunitySummaryRow {
    id: Uuid,
    slug: String,
    name: String,
    description: String,
    member_count: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct CountsRow {
    members: i64,
    questions: i64,
    polls: i64,
    articles: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct MemberRow {
    user_id: Uuid,
    username: String,
    display_name: String,
    joined_at: OffsetDateTime,
}

#[async_trait::async_trait]
impl CommunitiesRepo for PostgresRepositories {
    async fn create_community(
        &self,
        params: CreateCommunityParams,
    ) -> Result<CommunityRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        let now = OffsetDateTime::now_utc();

        let row: CommunityRow = sqlx::query_as(&format!(
            "INSERT INTO communities (id, slug, name, description, owner_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $6) RETURNING {COMMUNITY_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&params.slug)
        .bind(&params.name)
        .bind(&params.description)
        .bind(params.owner_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query(
            "INSERT INTO community_members (community_id, user_id, joined_at) VALUES ($1, $2, $3)",
        )
        .bind(row.id)
        .bind(row.owner_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool, RepoError> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM communities WHERE slug = $1)")
            .bind(slug)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<CommunityRecord>, RepoError> {
        let row: Option<CommunityRow> = sqlx::query_as(&format!(
            "SELECT {COMMUNITY_COLUMNS} FROM communities WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.map(Into::into))
    }

    async fn find_community(&self, id: Uuid) -> Result<Option<CommunityRecord>, RepoError> {
        let row: Option<CommunityRow> = sqlx::query_as(&format!(
            "SELECT {COMMUNITY_COLUMNS} FROM communities WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.map(Into::into))
    }

    async fn list_summaries(
        &self,
        search: Option<&str>,
    ) -> Result<Vec<CommunitySummary>, RepoError> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "SELECT c.id, c.slug, c.name, c.description, \
                    (SELECT COUNT(*) FROM community_members m WHERE m.community_id = c.id) AS member_count \
             FROM communities c WHERE TRUE",
        );
        if let Some(search) = search {
            Self::push_search(&mut qb, &["c.name", "c.description"], search);
        }
        qb.push(" ORDER BY member_count DESC, c.name ASC");

        let rows: Vec<CommunitySummaryRow> = qb
            .build_query_as::<CommunitySummaryRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| CommunitySummary {
                id: row.id,
                slug: row.slug,
                name: row.name,
                description: row.description,
                member_count: row.member_count,
            })
            .collect())
    }

    async fn counts(&self, id: Uuid) -> Result<CommunityCounts, RepoError> {
        let row: CountsRow = sqlx::query_as(
            "SELECT \
                (SELECT COUNT(*) FROM community_members WHERE community_id = $1) AS members, \
                (SELECT COUNT(*) FROM questions WHERE community_id = $1) AS questions, \
                (SELECT COUNT(*) FROM polls WHERE community_id = $1) AS polls, \
                (SELECT COUNT(*) FROM articles WHERE community_id = $1) AS articles",
        )
        .bind(id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(CommunityCounts {
            members: row.members,
            questions: row.questions,
            polls: row.polls,
            articles: row.articles,
        })
    }

    async fn is_member(&self, community_id: Uuid, user_id: Uuid) -> Result<bool, RepoError> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM community_members WHERE community_id = $1 AND user_id = $2)",
        )
        .bind(community_id)
        .bind(user_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn add_member(&self, community_id: Uuid, user_id: Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query(
            "INSERT INTO community_members (community_id, user_id, joined_at) VALUES ($1, $2, $3) \
             ON CONFLICT DO NOTHING",
        )
        .bind(community_id)
        .bind(user_id)
        .bind(OffsetDateTime::now_utc())
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() == 1)
    }

    async fn remove_member(&self, community_id: Uuid, user_id: Uuid) -> Result<bool, RepoError> {
        let result =
            sqlx::query("DELETE FROM community_members WHERE community_id = $1 AND user_id = $2")
                .bind(community_id)
                .bind(user_id)
                .execute(self.pool())
                .await
                .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() == 1)
    }

    async fn members(&self, community_id: Uuid) -> Result<Vec<CommunityMember>, RepoError> {
        let rows: Vec<MemberRow> = sqlx::query_as(
            "SELECT u.id AS user_id, u.username, u.display_name, m.joined_at \
             FROM community_members m INNER JOIN users u ON u.id = m.user_id \
             WHERE m.community_id = $1 ORDER BY m.joined_at ASC, u.username ASC",
        )
        .bind(community_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| CommunityMember {
                user: AuthorRef {
                    id: row.user_id,
                    username: row.username,
                    display_name: row.display_name,
                },
                joined_at: row.joined_at,
            })
            .collect())
    }

    async fn member_ids(&self, community_id: Uuid) -> Result<Vec<Uuid>, RepoError> {
        sqlx::query_scalar("SELECT user_id FROM community_members WHERE community_id = $1")
            .bind(community_id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)
    }
}
