//! Notification fan-out rules.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::types::{ContentKind, NotificationKind};

/// Kind of entity a notification points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "entity_kind", rename_all = "snake_case")]
pub enum EntityKind {
    Question,
    Answer,
    Comment,
    Article,
    Poll,
    Community,
    Challenge,
}

impl From<ContentKind> for EntityKind {
    fn from(kind: ContentKind) -> Self {
        match kind {
            ContentKind::Question => Self::Question,
            ContentKind::Answer => Self::Answer,
            ContentKind::Comment => Self::Comment,
            ContentKind::Article => Self::Article,
        }
    }
}

/// A notification ready to be persisted for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDraft {
    pub recipient_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub entity_kind: EntityKind,
    pub entity_id: Uuid,
    pub message: String,
}

/// Deduplicate recipients, keep first-seen order, and drop the actor.
pub fn recipients<I>(candidates: I, actor: Option<Uuid>) -> Vec<Uuid>
where
    I: IntoIterator<Item = Uuid>,
{
    let mut seen: HashSet<Uuid> = HashSet::new();
    let mut out: Vec<Uuid> = Vec::new();
    for id in candidates {
        if Some(id) == actor || !seen.insert(id) {
            continue;
        }
        out.push(id);
    }
    out
}

/// Build one draft per recipient for the same event.
pub fn fan_out<I>(
    candidates: I,
    actor: Option<Uuid>,
    kind: NotificationKind,
    entity_kind: EntityKind,
    entity_id: Uuid,
    message: &str,
) -> Vec<NotificationDraft>
where
    I: IntoIterator<Item = Uuid>,
{
    recipients(candidates, actor)
        .into_iter()
        .map(|recipient_id| NotificationDraft {
            recipient_id,
            actor_id: actor,
            kind,
            entity_kind,
            entity_id,
            message: message.to_string(),
        })
        .collect()
}

pub fn answer_message(actor: &str, question_title: &str) -> String {
    format!("{actor} answered your question \"{question_title}\"")
}

pub fn comment_message(actor: &str, target: ContentKind) -> String {
    format!("{actor} commented on your {target}")
}

pub fn upvote_message(actor: &str, target: ContentKind) -> String {
    format!("{actor} upvoted your {target}")
}

pub fn accepted_message(actor: &str, question_title: &str) -> String {
    format!("{actor} accepted your answer to \"{question_title}\"")
}

pub fn community_question_message(actor: &str, community: &str, title: &str) -> String {
    format!("{actor} asked \"{title}\" in {community}")
}

pub fn community_join_message(actor: &str, community: &str) -> String {
    format!("{actor} joined {community}")
}

pub fn poll_closed_message(question: &str) -> String {
    format!("The poll \"{question}\" has closed")
}

pub fn challenge_completed_message(title: &str, points: i32) -> String {
    format!("You completed the challenge \"{title}\" and earned {points} reputation")
}
