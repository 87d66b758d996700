use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::error::ServiceError;
use crate::application::notifications::NotificationService;
use crate::application::repos::{ChallengesRepo, ProgressUpdate};
use crate::domain::challenges::{Advance, advance};
use crate::domain::entities::{ChallengeProgress, ChallengeRecord};
use crate::domain::notifications::{EntityKind, NotificationDraft, challenge_completed_message};
use crate::domain::types::{ChallengeAction, NotificationKind};

/// Attempts at the compare-and-set before giving up on one challenge.
const MAX_PROGRESS_ATTEMPTS: usize = 5;

#[derive(Clone)]
pub struct ChallengeService {
    challenges: Arc<dyn ChallengesRepo>,
    notifications: NotificationService,
}

impl ChallengeService {
    pub fn new(challenges: Arc<dyn ChallengesRepo>, notifications: NotificationService) -> Self {
        Self {
            challenges,
            notifications,
        }
    }

    pub async fn list_active(&self) -> Result<Vec<ChallengeRecord>, ServiceError> {
        Ok(self.challenges.list_active().await?)
    }

    pub async fn progress_of(&self, user_id: Uuid) -> Result<Vec<ChallengeProgress>, ServiceError> {
        Ok(self.challenges.progress_of_user(user_id).await?)
    }

    /// Advance every active challenge bound to `action` by one step for the user.
    ///
    /// Returns the challenges this call completed.
    pub async fn record(
        &self,
        user_id: Uuid,
        action: ChallengeAction,
    ) -> Result<Vec<ChallengeRecord>, ServiceError> {
        let mut completed = Vec::new();
        for challenge in self.challenges.active_for_action(action).await? {
            if self.advance_one(user_id, &challenge).await? {
                completed.push(challenge);
            }
        }
        Ok(completed)
    }

    /// Record after the triggering write already succeeded; failures are logged only.
    pub async fn record_best_effort(&self, user_id: Uuid, action: ChallengeAction) {
        if let Err(err) = self.record(user_id, action).await {
            warn!(
                target = "agora::challenges",
                error = %err,
                %user_id,
                action = action.as_str(),
                "failed to record challenge progress"
            );
        }
    }

    async fn advance_one(
        &self,
        user_id: Uuid,
        challenge: &ChallengeRecord,
    ) -> Result<bool, ServiceError> {
        for _ in 0..MAX_PROGRESS_ATTEMPTS {
            let current = self.challenges.find_progress(user_id, challenge.id).await?;
            let expected = current.as_ref().map(|record| record.progress);
            let already_completed = current
                .as_ref()
                .is_some_and(|record| record.completed_at.is_some());
            let now = OffsetDateTime::now_utc();

            let (progress, completed_at, reward) =
                match advance(challenge, expected.unwrap_or(0), already_completed) {
                    Advance::AlreadyComplete => return Ok(false),
                    Advance::Progressed { progress } => (progress, None, None),
                    Advance::Completed {
                        progress,
                        reward_points,
                    } => (progress, Some(now), Some(reward_points)),
                };

            let applied = self
                .challenges
                .compare_and_set_progress(ProgressUpdate {
                    user_id,
                    challenge_id: challenge.id,
                    expected,
                    progress,
                    completed_at,
                    reward_points: reward,
                    now,
                })
                .await?;
            if !applied {
                continue;
            }

            let Some(reward_points) = reward else {
                return Ok(false);
            };
            self.announce(user_id, challenge, reward_points).await;
            return Ok(true);
        }

        warn!(
            target = "agora::challenges",
            %user_id,
            challenge = %challenge.slug,
            "challenge progress kept conflicting; skipping this step"
        );
        Err(ServiceError::conflict("challenge progress changed concurrently"))
    }

    async fn announce(&self, user_id: Uuid, challenge: &ChallengeRecord, reward_points: i32) {
        metrics::counter!("agora_challenges_completed_total").increment(1);
        info!(
            target = "agora::challenges",
            %user_id,
            challenge = %challenge.slug,
            reward_points,
            "challenge completed"
        );

        self.notifications
            .deliver_best_effort(vec![NotificationDraft {
                recipient_id: user_id,
                actor_id: None,
                kind: NotificationKind::ChallengeCompleted,
                entity_kind: EntityKind::Challenge,
                entity_id: challenge.id,
                message: challenge_completed_message(&challenge.title, reward_points),
            }])
            .await;
    }
}
