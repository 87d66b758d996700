use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    CreatePollParams, PollFilter, PollVoteOutcome, PollsRepo, RepoError,
};
use crate::domain::entities::{AuthorRef, ClosedPoll, PollOptionTally, PollRecord, PollSummary};
use crate::domain::types::PollStatus;

use super::{PostgresRepositories, map_sqlx_error};

const POLL_COLUMNS: &str =
    "id, author_id, community_id, question, status, closes_at, closed_at, created_at";

#[derive(Debug, sqlx::FromRow)]
struct PollRow {
    id: Uuid,
    author_id: Uuid,
    community_id: Option<Uuid>,
    question: String,
    status: PollStatus,
    closes_at: OffsetDateTime,
    closed_at: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
}

impl From<PollRow> for PollRecord {
    fn from(row: PollRow) -> Self {
        Self {
            id: row.id,
            author_id: row.author_id,
            community_id: row.community_id,
            question: row.question,
            status: row.status,
            closes_at: row.closes_at,
            closed_at: row.closed_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OptionTallyRow {
    id: Uuid,
    label: String,
    position: i32,
    votes: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct PollSummaryRow {
    id: Uuid,
    community_id: Option<Uuid>,
    question: String,
    status: PollStatus,
    closes_at: OffsetDateTime,
    created_at: OffsetDateTime,
    author_id: Uuid,
    author_username: String,
    author_display_name: String,
    total_votes: i64,
}

impl From<PollSummaryRow> for PollSummary {
    fn from(row: PollSummaryRow) -> Self {
        Self {
            id: row.id,
            author: AuthorRef {
                id: row.author_id,
                username: row.author_username,
                display_name: row.author_display_name,
            },
            community_id: row.community_id,
            question: row.question,
            status: row.status,
            total_votes: row.total_votes,
            closes_at: row.closes_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ClosedPollRow {
    id: Uuid,
    author_id: Uuid,
    question: String,
    voter_ids: Vec<Uuid>,
}

#[async_trait::async_trait]
impl PollsRepo for PostgresRepositories {
    async fn create_poll(&self, params: CreatePollParams) -> Result<PollRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let row: PollRow = sqlx::query_as(&format!(
            "INSERT INTO polls (id, author_id, community_id, question, status, closes_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {POLL_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(params.author_id)
        .bind(params.community_id)
        .bind(&params.question)
        .bind(PollStatus::Open)
        .bind(params.closes_at)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        for (position, label) in params.options.iter().enumerate() {
            let position = i32::try_from(position)
                .map_err(|_| RepoError::from_persistence("poll option position out of range"))?;
            sqlx::query(
                "INSERT INTO poll_options (id, poll_id, label, position) VALUES ($1, $2, $3, $4)",
            )
            .bind(Uuid::new_v4())
            .bind(row.id)
            .bind(label)
            .bind(position)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn find_poll(&self, id: Uuid) -> Result<Option<PollRecord>, RepoError> {
        let row: Option<PollRow> =
            sqlx::query_as(&format!("SELECT {POLL_COLUMNS} FROM polls WHERE id = $1"))
                .bind(id)
                .fetch_optional(self.pool())
                .await
                .map_err(map_sqlx_error)?;
        Ok(row.map(Into::into))
    }

    async fn option_tallies(&self, poll_id: Uuid) -> Result<Vec<PollOptionTally>, RepoError> {
        let rows: Vec<OptionTallyRow> = sqlx::query_as(
            "SELECT o.id, o.label, o.position, COUNT(v.user_id) AS votes \
             FROM poll_options o LEFT JOIN poll_votes v ON v.option_id = o.id \
             WHERE o.poll_id = $1 \
             GROUP BY o.id \
             ORDER BY o.position ASC",
        )
        .bind(poll_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| PollOptionTally {
                id: row.id,
                label: row.label,
                position: row.position,
                votes: row.votes,
            })
            .collect())
    }

    async fn choice_of(&self, poll_id: Uuid, user_id: Uuid) -> Result<Option<Uuid>, RepoError> {
        sqlx::query_scalar("SELECT option_id FROM poll_votes WHERE poll_id = $1 AND user_id = $2")
            .bind(poll_id)
            .bind(user_id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn list_summaries(&self, filter: PollFilter) -> Result<Vec<PollSummary>, RepoError> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "SELECT p.id, p.community_id, p.question, p.status, p.closes_at, p.created_at, \
                    u.id AS author_id, u.username AS author_username, \
                    u.display_name AS author_display_name, \
                    (SELECT COUNT(*) FROM poll_votes v WHERE v.poll_id = p.id) AS total_votes \
             FROM polls p INNER JOIN users u ON u.id = p.author_id WHERE TRUE",
        );
        if let Some(status) = filter.status {
            qb.push(" AND p.status = ");
            qb.push_bind(status);
        }
        if let Some(community_id) = filter.community_id {
            qb.push(" AND p.community_id = ");
            qb.push_bind(community_id);
        }
        qb.push(" ORDER BY p.created_at DESC, p.id DESC");

        let rows: Vec<PollSummaryRow> = qb
            .build_query_as::<PollSummaryRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn cast_vote(
        &self,
        poll_id: Uuid,
        user_id: Uuid,
        option_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<PollVoteOutcome, RepoError> {
        // `xmax = 0` only holds for freshly inserted rows.
        let inserted: Option<bool> = sqlx::query_scalar(
            "INSERT INTO poll_votes (poll_id, user_id, option_id, created_at) \
             SELECT p.id, $2, $3, $4 FROM polls p \
             WHERE p.id = $1 AND p.status = 'open' AND p.closes_at > $4 \
             ON CONFLICT (poll_id, user_id) \
             DO UPDATE SET option_id = EXCLUDED.option_id, created_at = EXCLUDED.created_at \
             RETURNING (xmax = 0)",
        )
        .bind(poll_id)
        .bind(user_id)
        .bind(option_id)
        .bind(now)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(match inserted {
            None => PollVoteOutcome::Closed,
            Some(true) => PollVoteOutcome::Cast,
            Some(false) => PollVoteOutcome::Changed,
        })
    }

    async fn close_poll(&self, id: Uuid, now: OffsetDateTime) -> Result<bool, RepoError> {
        let result = sqlx::query(
            "UPDATE polls SET status = 'closed', closed_at = $2 WHERE id = $1 AND status = 'open'",
        )
        .bind(id)
        .bind(now)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() == 1)
    }

    async fn close_due(&self, now: OffsetDateTime) -> Result<Vec<ClosedPoll>, RepoError> {
        let rows: Vec<ClosedPollRow> = sqlx::query_as(
            "WITH closed AS ( \
                 UPDATE polls SET status = 'closed', closed_at = $1 \
                 WHERE status = 'open' AND closes_at <= $1 \
                 RETURNING id, author_id, question \
             ) \
             SELECT c.id, c.author_id, c.question, \
                    ARRAY(SELECT v.user_id FROM poll_votes v WHERE v.poll_id = c.id \
                          ORDER BY v.created_at) AS voter_ids \
             FROM closed c",
        )
        .bind(now)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| ClosedPoll {
                id: row.id,
                author_id: row.author_id,
                question: row.question,
                voter_ids: row.voter_ids,
            })
            .collect())
    }

    async fn voter_ids(&self, poll_id: Uuid) -> Result<Vec<Uuid>, RepoError> {
        sqlx::query_scalar(
            "SELECT user_id FROM poll_votes WHERE poll_id = $1 ORDER BY created_at ASC",
        )
        .bind(poll_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)
    }
}
