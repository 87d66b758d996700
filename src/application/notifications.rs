use std::sync::Arc;

use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::application::error::ServiceError;
use crate::application::events::{EventBus, LiveEvent};
use crate::application::pagination::{CursorPage, NotificationCursor, PageRequest};
use crate::application::repos::NotificationsRepo;
use crate::domain::entities::NotificationRecord;
use crate::domain::notifications::NotificationDraft;
use crate::domain::types::LiveEventName;

#[derive(Clone)]
pub struct NotificationService {
    repo: Arc<dyn NotificationsRepo>,
    events: EventBus,
}

impl NotificationService {
    pub fn new(repo: Arc<dyn NotificationsRepo>, events: EventBus) -> Self {
        Self { repo, events }
    }

    /// Persist drafts and push a `notificationUpdate` to each recipient.
    pub async fn deliver(
        &self,
        drafts: Vec<NotificationDraft>,
    ) -> Result<Vec<NotificationRecord>, ServiceError> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }

        let records = self.repo.insert_many(drafts).await?;
        for record in &records {
            metrics::counter!("agora_notifications_sent_total", "kind" => record.kind.as_str())
                .increment(1);
            self.events.publish(
                LiveEvent::to_user(
                    LiveEventName::NotificationUpdate,
                    record.recipient_id,
                    record.id,
                    "created",
                )
                .with("kind", record.kind.as_str())
                .with("message", record.message.clone()),
            );
        }
        Ok(records)
    }

    /// Deliver after the triggering write already succeeded; failures are logged only.
    pub async fn deliver_best_effort(&self, drafts: Vec<NotificationDraft>) {
        let count = drafts.len();
        if let Err(err) = self.deliver(drafts).await {
            warn!(
                target = "agora::notifications",
                error = %err,
                count,
                "failed to deliver notifications"
            );
        }
    }

    pub async fn list(
        &self,
        recipient_id: Uuid,
        unread_only: bool,
        page: PageRequest<NotificationCursor>,
    ) -> Result<CursorPage<NotificationRecord>, ServiceError> {
        Ok(self.repo.list_for(recipient_id, unread_only, page).await?)
    }

    pub async fn unread_count(&self, recipient_id: Uuid) -> Result<i64, ServiceError> {
        Ok(self.repo.unread_count(recipient_id).await?)
    }

    pub async fn mark_read(&self, recipient_id: Uuid, id: Uuid) -> Result<(), ServiceError> {
        let now = OffsetDateTime::now_utc();
        if !self.repo.mark_read(id, recipient_id, now).await? {
            return Err(ServiceError::not_found("notification"));
        }
        self.publish_read(recipient_id, id);
        Ok(())
    }

    pub async fn mark_all_read(&self, recipient_id: Uuid) -> Result<u64, ServiceError> {
        let now = OffsetDateTime::now_utc();
        let updated = self.repo.mark_all_read(recipient_id, now).await?;
        if updated > 0 {
            self.events.publish(
                LiveEvent::to_user(
                    LiveEventName::NotificationUpdate,
                    recipient_id,
                    recipient_id,
                    "read_all",
                )
                .with("count", updated),
            );
        }
        Ok(updated)
    }

    fn publish_read(&self, recipient_id: Uuid, id: Uuid) {
        self.events.publish(LiveEvent::to_user(
            LiveEventName::NotificationUpdate,
            recipient_id,
            id,
            "read",
        ));
    }
}
