//! Shared request bodies and wire-level enums for the Agora community API.
//!
//! The enums double as Postgres enum types when the `sqlx` feature is on, so
//! the server and any client agree on a single spelling for every variant.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Direction of a vote on a piece of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "vote_direction", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

/// Kinds of content that can receive votes or comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "content_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Question,
    Answer,
    Comment,
    Article,
}

impl ContentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Question => "question",
            Self::Answer => "answer",
            Self::Comment => "comment",
            Self::Article => "article",
        }
    }

    /// Comments attach to questions, answers and articles but never to other comments.
    pub fn accepts_comments(self) -> bool {
        !matches!(self, Self::Comment)
    }
}

/// Orderings offered by the question list endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionOrder {
    #[default]
    Newest,
    Active,
    Unanswered,
    MostViewed,
    Top,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "poll_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PollStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "notification_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Answer,
    Comment,
    Upvote,
    AcceptedAnswer,
    CommunityQuestion,
    CommunityJoin,
    PollClosed,
    ChallengeCompleted,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Answer => "answer",
            Self::Comment => "comment",
            Self::Upvote => "upvote",
            Self::AcceptedAnswer => "accepted_answer",
            Self::CommunityQuestion => "community_question",
            Self::CommunityJoin => "community_join",
            Self::PollClosed => "poll_closed",
            Self::ChallengeCompleted => "challenge_completed",
        }
    }
}

/// User actions that count toward challenge progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "challenge_action", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeAction {
    AskQuestion,
    PostAnswer,
    PostComment,
    CastVote,
    PublishArticle,
    CreatePoll,
    VotePoll,
}

impl ChallengeAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AskQuestion => "ask_question",
            Self::PostAnswer => "post_answer",
            Self::PostComment => "post_comment",
            Self::CastVote => "cast_vote",
            Self::PublishArticle => "publish_article",
            Self::CreatePoll => "create_poll",
            Self::VotePoll => "vote_poll",
        }
    }
}

/// Names of events pushed over the live-update stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiveEventName {
    #[serde(rename = "questionUpdate")]
    QuestionUpdate,
    #[serde(rename = "answerUpdate")]
    AnswerUpdate,
    #[serde(rename = "commentUpdate")]
    CommentUpdate,
    #[serde(rename = "pollUpdate")]
    PollUpdate,
    #[serde(rename = "articleUpdate")]
    ArticleUpdate,
    #[serde(rename = "communityUpdate")]
    CommunityUpdate,
    #[serde(rename = "notificationUpdate")]
    NotificationUpdate,
}

impl LiveEventName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::QuestionUpdate => "questionUpdate",
            Self::AnswerUpdate => "answerUpdate",
            Self::CommentUpdate => "commentUpdate",
            Self::PollUpdate => "pollUpdate",
            Self::ArticleUpdate => "articleUpdate",
            Self::CommunityUpdate => "communityUpdate",
            Self::NotificationUpdate => "notificationUpdate",
        }
    }
}

macro_rules! display_via_as_str {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )+
    };
}

display_via_as_str!(
    VoteDirection,
    ContentKind,
    NotificationKind,
    ChallengeAction,
    LiveEventName,
);

// ----- users -----

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProfileUpdateRequest {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

// ----- questions, answers, comments -----

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuestionCreateRequest {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub community_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct QuestionUpdateRequest {
    pub title: Option<String>,
    pub body: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AcceptAnswerRequest {
    pub answer_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnswerCreateRequest {
    pub question_id: Uuid,
    pub body: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommentCreateRequest {
    pub body: String,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct VoteRequest {
    pub direction: VoteDirection,
}

// ----- communities -----

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommunityCreateRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

// ----- polls -----

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollCreateRequest {
    pub question: String,
    pub options: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub closes_at: OffsetDateTime,
    pub community_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct PollVoteRequest {
    pub option_id: Uuid,
}

// ----- articles -----

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArticleCreateRequest {
    pub title: String,
    pub body: String,
    pub community_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ArticleUpdateRequest {
    pub title: Option<String>,
    pub body: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_event_names_use_camel_case_on_the_wire() {
        let json = serde_json::to_string(&LiveEventName::NotificationUpdate).unwrap();
        assert_eq!(json, "\"notificationUpdate\"");
        assert_eq!(
            LiveEventName::QuestionUpdate.as_str(),
            "questionUpdate"
        );
    }

    #[test]
    fn question_order_parses_snake_case() {
        let order: QuestionOrder = serde_json::from_str("\"most_viewed\"").unwrap();
        assert_eq!(order, QuestionOrder::MostViewed);
        assert_eq!(QuestionOrder::default(), QuestionOrder::Newest);
    }

    #[test]
    fn poll_request_reads_rfc3339_deadline() {
        let body = r#"{"question":"Tabs or spaces?","options":["tabs","spaces"],"closes_at":"2030-01-01T00:00:00Z"}"#;
        let request: PollCreateRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.options.len(), 2);
        assert_eq!(request.closes_at.year(), 2030);
        assert!(request.community_id.is_none());
    }

    #[test]
    fn comments_do_not_nest() {
        assert!(ContentKind::Question.accepts_comments());
        assert!(!ContentKind::Comment.accepts_comments());
    }
}
