//! Domain entities mirrored from persistent storage, plus the composed read
//! models the API hands out.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::notifications::EntityKind;
use crate::domain::types::{
    ChallengeAction, ContentKind, NotificationKind, PollStatus, VoteDirection,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub password_hash: Vec<u8>,
    pub password_salt: Vec<u8>,
    pub reputation: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl UserRecord {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            bio: self.bio.clone(),
            avatar_url: self.avatar_url.clone(),
            reputation: self.reputation,
            created_at: self.created_at,
        }
    }

    pub fn author_ref(&self) -> AuthorRef {
        AuthorRef {
            id: self.id,
            username: self.username.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

/// Public view of a user; never carries credentials or the email address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub reputation: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Compact author reference embedded in content listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorRef {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
}

// ----- questions -----

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionRecord {
    pub id: Uuid,
    pub author_id: Uuid,
    pub community_id: Option<Uuid>,
    pub title: String,
    pub body: String,
    pub views: i64,
    pub accepted_answer_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Row used by the question list and tag pages before in-memory ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionSummary {
    pub id: Uuid,
    pub title: String,
    pub author: AuthorRef,
    pub community_id: Option<Uuid>,
    pub tags: Vec<String>,
    pub views: i64,
    pub score: i64,
    pub answer_count: i64,
    pub has_accepted_answer: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_activity_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionDetail {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub author: AuthorRef,
    pub community_id: Option<Uuid>,
    pub tags: Vec<String>,
    pub views: i64,
    pub score: i64,
    pub viewer_vote: Option<VoteDirection>,
    pub accepted_answer_id: Option<Uuid>,
    pub answers: Vec<AnswerView>,
    pub comments: Vec<CommentView>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

// ----- answers and comments -----

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRecord {
    pub id: Uuid,
    pub question_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerView {
    pub id: Uuid,
    pub question_id: Uuid,
    pub author: AuthorRef,
    pub body: String,
    pub score: i64,
    pub accepted: bool,
    pub viewer_vote: Option<VoteDirection>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRecord {
    pub id: Uuid,
    pub target_kind: ContentKind,
    pub target_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentView {
    pub id: Uuid,
    pub target_kind: ContentKind,
    pub target_id: Uuid,
    pub author: AuthorRef,
    pub body: String,
    pub score: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Result of casting a vote: the vote that now stands and the new score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VoteTally {
    pub target_kind: ContentKind,
    pub target_id: Uuid,
    pub score: i64,
    pub viewer_vote: Option<VoteDirection>,
}

// ----- tags -----

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagRecord {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagUsage {
    pub name: String,
    pub description: Option<String>,
    pub question_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagDetail {
    pub tag: TagRecord,
    pub questions: Vec<QuestionSummary>,
}

// ----- communities -----

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommunityRecord {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub owner_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommunitySummary {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub member_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CommunityCounts {
    pub members: i64,
    pub questions: i64,
    pub polls: i64,
    pub articles: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommunityDetail {
    #[serde(flatten)]
    pub community: CommunityRecord,
    pub owner: AuthorRef,
    pub counts: CommunityCounts,
    pub viewer_is_member: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommunityMember {
    pub user: AuthorRef,
    #[serde(with = "time::serde::rfc3339")]
    pub joined_at: OffsetDateTime,
}

// ----- polls -----

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollRecord {
    pub id: Uuid,
    pub author_id: Uuid,
    pub community_id: Option<Uuid>,
    pub question: String,
    pub status: PollStatus,
    pub closes_at: OffsetDateTime,
    pub closed_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollOptionTally {
    pub id: Uuid,
    pub label: String,
    pub position: i32,
    pub votes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollView {
    pub id: Uuid,
    pub author: AuthorRef,
    pub community_id: Option<Uuid>,
    pub question: String,
    pub status: PollStatus,
    pub accepting_votes: bool,
    pub options: Vec<PollOptionTally>,
    pub total_votes: i64,
    pub viewer_choice: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub closes_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub closed_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollSummary {
    pub id: Uuid,
    pub author: AuthorRef,
    pub community_id: Option<Uuid>,
    pub question: String,
    pub status: PollStatus,
    pub total_votes: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub closes_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A poll that the closing job just transitioned, with everyone to notify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedPoll {
    pub id: Uuid,
    pub author_id: Uuid,
    pub question: String,
    pub voter_ids: Vec<Uuid>,
}

// ----- articles -----

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRecord {
    pub id: Uuid,
    pub author_id: Uuid,
    pub community_id: Option<Uuid>,
    pub title: String,
    pub body: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleSummary {
    pub id: Uuid,
    pub title: String,
    pub author: AuthorRef,
    pub community_id: Option<Uuid>,
    pub score: i64,
    pub comment_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleView {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub author: AuthorRef,
    pub community_id: Option<Uuid>,
    pub score: i64,
    pub viewer_vote: Option<VoteDirection>,
    pub comments: Vec<CommentView>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

// ----- notifications -----

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub entity_kind: EntityKind,
    pub entity_id: Uuid,
    pub message: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub read_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

// ----- challenges -----

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChallengeRecord {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub action: ChallengeAction,
    pub target: i32,
    pub reward_points: i32,
    pub active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserChallengeRecord {
    pub user_id: Uuid,
    pub challenge_id: Uuid,
    pub progress: i32,
    pub completed_at: Option<OffsetDateTime>,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChallengeProgress {
    pub challenge: ChallengeRecord,
    pub progress: i32,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}
