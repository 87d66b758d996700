//! Shared domain enumerations aligned with persisted database enums.
//!
//! The wire and storage spelling lives in `agora-api-types`; this module adds
//! the lookups the service layer needs on top of it.

pub use agora_api_types::{
    ChallengeAction, ContentKind, LiveEventName, NotificationKind, PollStatus, QuestionOrder,
    VoteDirection,
};

/// Parse a content kind from a URL segment such as `question` or `article`.
pub fn parse_content_kind(raw: &str) -> Option<ContentKind> {
    match raw {
        "question" => Some(ContentKind::Question),
        "answer" => Some(ContentKind::Answer),
        "comment" => Some(ContentKind::Comment),
        "article" => Some(ContentKind::Article),
        _ => None,
    }
}

/// Every challenge action, in the order they are offered to users.
pub fn all_challenge_actions() -> &'static [ChallengeAction] {
    &[
        ChallengeAction::AskQuestion,
        ChallengeAction::PostAnswer,
        ChallengeAction::PostComment,
        ChallengeAction::CastVote,
        ChallengeAction::PublishArticle,
        ChallengeAction::CreatePoll,
        ChallengeAction::VotePoll,
    ]
}
