use uuid::Uuid;

use crate::application::repos::{RepoError, VotesRepo};
use crate::domain::types::{ContentKind, VoteDirection};
use crate::domain::votes::{VoteOutcome, resolve_vote};

use super::{PostgresRepositories, map_sqlx_error};

#[async_trait::async_trait]
impl VotesRepo for PostgresRepositories {
    async fn toggle_vote(
        &self,
        target_kind: ContentKind,
        target_id: Uuid,
        user_id: Uuid,
        requested: VoteDirection,
    ) -> Result<VoteOutcome, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let voted_before = sqlx::query(
            "INSERT INTO vote_history (target_kind, target_id, user_id) VALUES ($1, $2, $3) \
             ON CONFLICT DO NOTHING",
        )
        .bind(target_kind)
        .bind(target_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .rows_affected()
            == 0;

        let upvoted_before: bool = sqlx::query_scalar(
            "SELECT upvoted FROM vote_history \
             WHERE target_kind = $1 AND target_id = $2 AND user_id = $3 FOR UPDATE",
        )
        .bind(target_kind)
        .bind(target_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let current: Option<VoteDirection> = sqlx::query_scalar(
            "SELECT direction FROM votes \
             WHERE target_kind = $1 AND target_id = $2 AND user_id = $3 FOR UPDATE",
        )
        .bind(target_kind)
        .bind(target_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let change = resolve_vote(current, requested);
        match change.resulting() {
            Some(direction) => {
                sqlx::query(
                    "INSERT INTO votes (target_kind, target_id, user_id, direction) \
                     VALUES ($1, $2, $3, $4) \
                     ON CONFLICT (target_kind, target_id, user_id) \
                     DO UPDATE SET direction = EXCLUDED.direction, created_at = now()",
                )
                .bind(target_kind)
                .bind(target_id)
                .bind(user_id)
                .bind(direction)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            }
            None => {
                sqlx::query(
                    "DELETE FROM votes WHERE target_kind = $1 AND target_id = $2 AND user_id = $3",
                )
                .bind(target_kind)
                .bind(target_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            }
        }

        let outcome = VoteOutcome::new(change, voted_before, upvoted_before);
        if outcome.first_upvote {
            sqlx::query(
                "UPDATE vote_history SET upvoted = TRUE \
                 WHERE target_kind = $1 AND target_id = $2 AND user_id = $3",
            )
            .bind(target_kind)
            .bind(target_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(outcome)
    }

    async fn score(&self, target_kind: ContentKind, target_id: Uuid) -> Result<i64, RepoError> {
        sqlx::query_scalar(
            "SELECT COALESCE(SUM(CASE WHEN direction = 'up' THEN 1 ELSE -1 END), 0)::bigint \
             FROM votes WHERE target_kind = $1 AND target_id = $2",
        )
        .bind(target_kind)
        .bind(target_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn vote_of(
        &self,
        target_kind: ContentKind,
        target_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<VoteDirection>, RepoError> {
        sqlx::query_scalar(
            "SELECT direction FROM votes \
             WHERE target_kind = $1 AND target_id = $2 AND user_id = $3",
        )
        .bind(target_kind)
        .bind(target_id)
        .bind(user_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)
    }
}
