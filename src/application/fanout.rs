//! Follow-up effects that content writes trigger once they have been stored.

use uuid::Uuid;

use crate::application::challenges::ChallengeService;
use crate::application::events::{EventBus, LiveEvent};
use crate::application::notifications::NotificationService;
use crate::domain::notifications::NotificationDraft;
use crate::domain::types::ChallengeAction;

#[derive(Clone)]
pub struct Fanout {
    pub notifications: NotificationService,
    pub challenges: ChallengeService,
    pub events: EventBus,
}

impl Fanout {
    pub fn new(
        notifications: NotificationService,
        challenges: ChallengeService,
        events: EventBus,
    ) -> Self {
        Self {
            notifications,
            challenges,
            events,
        }
    }

    pub async fn notify(&self, drafts: Vec<NotificationDraft>) {
        self.notifications.deliver_best_effort(drafts).await;
    }

    pub async fn progress(&self, user_id: Uuid, action: ChallengeAction) {
        self.challenges.record_best_effort(user_id, action).await;
    }

    pub fn publish(&self, event: LiveEvent) {
        self.events.publish(event);
    }
}
