use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{ChallengesRepo, ProgressUpdate, RepoError};
use crate::domain::entities::{ChallengeProgress, ChallengeRecord, UserChallengeRecord};
use crate::domain::types::ChallengeAction;

use super::{PostgresRepositories, map_sqlx_error};

const CHALLENGE_COLUMNS: &str =
    "id, slug, title, description, action, target, reward_points, active, created_at";

#[derive(Debug, sqlx::FromRow)]
struct ChallengeRow {
    id: Uuid,
    slug: String,
    title: String,
    description: String,
    action: ChallengeAction,
    target: i32,
    reward_points: i32,
    active: bool,
    created_at: OffsetDateTime,
}

impl From<ChallengeRow> for ChallengeRecord {
    fn from(row: ChallengeRow) -> Self {
        Self {
            id: row.id,
            slug: row.slug,
            title: row.title,
            description: row.description,
            action: row.action,
            target: row.target,
            reward_points: row.reward_points,
            active: row.active,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserChallengeRow {
    user_id: Uuid,
    challenge_id: Uuid,
    progress: i32,
    completed_at: Option<OffsetDateTime>,
    updated_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
struct ProgressRow {
    #[sqlx(flatten)]
    challenge: ChallengeRow,
    progress: i32,
    completed_at: Option<OffsetDateTime>,
}

#[async_trait::async_trait]
impl ChallengesRepo for PostgresRepositories {
    async fn list_active(&self) -> Result<Vec<ChallengeRecord>, RepoError> {
        let rows: Vec<ChallengeRow> = sqlx::query_as(&format!(
            "SELECT {CHALLENGE_COLUMNS} FROM challenges WHERE active ORDER BY action, target"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn active_for_action(
        &self,
        action: ChallengeAction,
    ) -> Result<Vec<ChallengeRecord>, RepoError> {
        let rows: Vec<ChallengeRow> = sqlx::query_as(&format!(
            "SELECT {CHALLENGE_COLUMNS} FROM challenges WHERE active AND action = $1 ORDER BY target"
        ))
        .bind(action)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_progress(
        &self,
        user_id: Uuid,
        challenge_id: Uuid,
    ) -> Result<Option<UserChallengeRecord>, RepoError> {
        let row: Option<UserChallengeRow> = sqlx::query_as(
            "SELECT user_id, challenge_id, progress, completed_at, updated_at \
             FROM user_challenges WHERE user_id = $1 AND challenge_id = $2",
        )
        .bind(user_id)
        .bind(challenge_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(|row| UserChallengeRecord {
            user_id: row.user_id,
            challenge_id: row.challenge_id,
            progress: row.progress,
            completed_at: row.completed_at,
            updated_at: row.updated_at,
        }))
    }

    async fn compare_and_set_progress(&self, update: ProgressUpdate) -> Result<bool, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let result = match update.expected {
            None => {
                sqlx::query(
                    "INSERT INTO user_challenges (user_id, challenge_id, progress, completed_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5) ON CONFLICT DO NOTHING",
                )
                .bind(update.user_id)
                .bind(update.challenge_id)
                .bind(update.progress)
                .bind(update.completed_at)
                .bind(update.now)
                .execute(&mut *tx)
                .await
            }
            Some(expected) => {
                sqlx::query(
                    "UPDATE user_challenges SET progress = $3, completed_at = $4, updated_at = $5 \
                     WHERE user_id = $1 AND challenge_id = $2 \
                       AND progress = $6 AND completed_at IS NULL",
                )
                .bind(update.user_id)
                .bind(update.challenge_id)
                .bind(update.progress)
                .bind(update.completed_at)
                .bind(update.now)
                .bind(expected)
                .execute(&mut *tx)
                .await
            }
        }
        .map_err(map_sqlx_error)?;

        if result.rows_affected() != 1 {
            return Ok(false);
        }

        if let Some(points) = update.reward_points {
            Self::shift_reputation(&mut *tx, update.user_id, i64::from(points)).await?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(true)
    }

    async fn progress_of_user(&self, user_id: Uuid) -> Result<Vec<ChallengeProgress>, RepoError> {
        let rows: Vec<ProgressRow> = sqlx::query_as(
            "SELECT c.id, c.slug, c.title, c.description, c.action, c.target, c.reward_points, \
                    c.active, c.created_at, uc.progress, uc.completed_at \
             FROM user_challenges uc INNER JOIN challenges c ON c.id = uc.challenge_id \
             WHERE uc.user_id = $1 \
             ORDER BY uc.completed_at IS NULL, c.action, c.target",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| ChallengeProgress {
                challenge: row.challenge.into(),
                progress: row.progress,
                completed_at: row.completed_at,
            })
            .collect())
    }
}
