//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{
    CursorPage, NotificationCursor, PageRequest, PaginationError,
};
use crate::domain::entities::{
    AnswerRecord, AnswerView, ArticleRecord, ArticleSummary, ChallengeProgress, ChallengeRecord,
    ClosedPoll, CommentRecord, CommentView, CommunityCounts, CommunityMember, CommunityRecord,
    CommunitySummary, NotificationRecord, PollOptionTally, PollRecord, PollSummary,
    QuestionRecord, QuestionSummary, TagRecord, TagUsage, UserChallengeRecord, UserRecord,
};
use crate::domain::notifications::NotificationDraft;
use crate::domain::sessions::SessionRecord;
use crate::domain::types::{ChallengeAction, ContentKind, PollStatus, VoteDirection};
use crate::domain::votes::VoteOutcome;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
    #[error(transparent)]
    Pagination(#[from] PaginationError),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

// ----- users and sessions -----

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub password_hash: Vec<u8>,
    pub password_salt: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct UpdateProfileParams {
    pub id: Uuid,
    pub display_name: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError>;

    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError>;

    /// Users ordered by reputation, optionally filtered by a case-insensitive search.
    async fn list_users(
        &self,
        search: Option<&str>,
        limit: u32,
    ) -> Result<Vec<UserRecord>, RepoError>;

    async fn update_profile(&self, params: UpdateProfileParams) -> Result<UserRecord, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateSessionParams {
    pub user_id: Uuid,
    pub prefix: String,
    pub hashed_secret: Vec<u8>,
    pub expires_at: OffsetDateTime,
}

#[async_trait]
pub trait SessionsRepo: Send + Sync {
    async fn create_session(&self, params: CreateSessionParams)
    -> Result<SessionRecord, RepoError>;

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<SessionRecord>, RepoError>;

    async fn revoke_session(&self, id: Uuid, now: OffsetDateTime) -> Result<(), RepoError>;

    async fn touch_session(&self, id: Uuid, now: OffsetDateTime) -> Result<(), RepoError>;
}

// ----- questions, answers, comments -----

#[derive(Debug, Clone, Default)]
pub struct QuestionFilter {
    pub search: Option<String>,
    pub tag: Option<String>,
    pub community_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct CreateQuestionParams {
    pub author_id: Uuid,
    pub community_id: Option<Uuid>,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct UpdateQuestionParams {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    /// `None` leaves the tag set untouched.
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy)]
pub struct AcceptedAnswerSwap {
    pub question_id: Uuid,
    pub expected: Option<Uuid>,
    pub accepted: Option<Uuid>,
    /// Author of the answer losing acceptance; loses `points`.
    pub previous_author: Option<Uuid>,
    /// Author of the answer gaining acceptance; gains `points`.
    pub next_author: Option<Uuid>,
    pub points: i64,
}

impl AcceptedAnswerSwap {
    /// Reputation deltas per user, with a self-cancelling pair collapsed.
    pub fn reputation_deltas(&self) -> Vec<(Uuid, i64)> {
        let mut deltas: Vec<(Uuid, i64)> = Vec::with_capacity(2);
        let changes = [
            self.previous_author.map(|id| (id, -self.points)),
            self.next_author.map(|id| (id, self.points)),
        ];
        for (user_id, delta) in changes.into_iter().flatten() {
            match deltas.iter_mut().find(|(id, _)| *id == user_id) {
                Some((_, total)) => *total += delta,
                None => deltas.push((user_id, delta)),
            }
        }
        deltas.retain(|(_, delta)| *delta != 0);
        deltas
    }
}

#[async_trait]
pub trait QuestionsRepo: Send + Sync {
    /// Insert the question and upsert its tags in one transaction.
    async fn create_question(
        &self,
        params: CreateQuestionParams,
    ) -> Result<QuestionRecord, RepoError>;

    async fn find_question(&self, id: Uuid) -> Result<Option<QuestionRecord>, RepoError>;

    async fn question_tags(&self, id: Uuid) -> Result<Vec<String>, RepoError>;

    /// Unordered summaries matching the filter; ordering happens in the service.
    async fn list_summaries(
        &self,
        filter: &QuestionFilter,
    ) -> Result<Vec<QuestionSummary>, RepoError>;

    async fn update_question(
        &self,
        params: UpdateQuestionParams,
    ) -> Result<QuestionRecord, RepoError>;

    /// Delete the question with its answers, comments and votes.
    async fn delete_question(&self, id: Uuid) -> Result<(), RepoError>;

    /// Record a distinct view; returns `true` when this viewer was new.
    async fn record_view(&self, question_id: Uuid, viewer_id: Uuid) -> Result<bool, RepoError>;

    /// Swap the accepted answer only if it still equals `expected`, moving the
    /// acceptance reputation in the same transaction.
    async fn swap_accepted_answer(&self, swap: AcceptedAnswerSwap) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait AnswersRepo: Send + Sync {
    async fn create_answer(
        &self,
        question_id: Uuid,
        author_id: Uuid,
        body: String,
    ) -> Result<AnswerRecord, RepoError>;

    async fn find_answer(&self, id: Uuid) -> Result<Option<AnswerRecord>, RepoError>;

    /// Answers with scores, accepted answer first, then by score and age.
    async fn list_for_question(
        &self,
        question_id: Uuid,
        viewer_id: Option<Uuid>,
    ) -> Result<Vec<AnswerView>, RepoError>;

    async fn delete_answer(&self, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    async fn create_comment(
        &self,
        target_kind: ContentKind,
        target_id: Uuid,
        author_id: Uuid,
        body: String,
    ) -> Result<CommentRecord, RepoError>;

    async fn find_comment(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError>;

    async fn list_for_target(
        &self,
        target_kind: ContentKind,
        target_id: Uuid,
    ) -> Result<Vec<CommentView>, RepoError>;

    async fn delete_comment(&self, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait VotesRepo: Send + Sync {
    /// Resolve and apply a vote request atomically against the stored vote,
    /// recording the voter's history on the target.
    async fn toggle_vote(
        &self,
        target_kind: ContentKind,
        target_id: Uuid,
        user_id: Uuid,
        requested: VoteDirection,
    ) -> Result<VoteOutcome, RepoError>;

    async fn score(&self, target_kind: ContentKind, target_id: Uuid) -> Result<i64, RepoError>;

    async fn vote_of(
        &self,
        target_kind: ContentKind,
        target_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<VoteDirection>, RepoError>;
}

#[async_trait]
pub trait TagsRepo: Send + Sync {
    /// Tags with question counts, most used first.
    async fn list_usage(&self, search: Option<&str>) -> Result<Vec<TagUsage>, RepoError>;

    async fn find_tag(&self, name: &str) -> Result<Option<TagRecord>, RepoError>;
}

// ----- communities -----

#[derive(Debug, Clone)]
pub struct CreateCommunityParams {
    pub slug: String,
    pub name: String,
    pub description: String,
    pub owner_id: Uuid,
}

#[async_trait]
pub trait CommunitiesRepo: Send + Sync {
    /// Insert the community and its owner's membership in one transaction.
    async fn create_community(
        &self,
        params: CreateCommunityParams,
    ) -> Result<CommunityRecord, RepoError>;

    async fn slug_exists(&self, slug: &str) -> Result<bool, RepoError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<CommunityRecord>, RepoError>;

    async fn find_community(&self, id: Uuid) -> Result<Option<CommunityRecord>, RepoError>;

    async fn list_summaries(
        &self,
        search: Option<&str>,
    ) -> Result<Vec<CommunitySummary>, RepoError>;

    async fn counts(&self, id: Uuid) -> Result<CommunityCounts, RepoError>;

    async fn is_member(&self, community_id: Uuid, user_id: Uuid) -> Result<bool, RepoError>;

    /// Returns `true` when a membership row was inserted.
    async fn add_member(&self, community_id: Uuid, user_id: Uuid) -> Result<bool, RepoError>;

    /// Returns `true` when a membership row was removed.
    async fn remove_member(&self, community_id: Uuid, user_id: Uuid) -> Result<bool, RepoError>;

    async fn members(&self, community_id: Uuid) -> Result<Vec<CommunityMember>, RepoError>;

    async fn member_ids(&self, community_id: Uuid) -> Result<Vec<Uuid>, RepoError>;
}

// ----- polls -----

#[derive(Debug, Clone)]
pub struct CreatePollParams {
    pub author_id: Uuid,
    pub community_id: Option<Uuid>,
    pub question: String,
    pub options: Vec<String>,
    pub closes_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PollFilter {
    pub status: Option<PollStatus>,
    pub community_id: Option<Uuid>,
}

/// What happened to a poll vote at the storage layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollVoteOutcome {
    /// First vote by this user on this poll.
    Cast,
    /// The user's existing vote now points at a different option.
    Changed,
    /// The poll stopped accepting votes before the write landed.
    Closed,
}

#[async_trait]
pub trait PollsRepo: Send + Sync {
    async fn create_poll(&self, params: CreatePollParams) -> Result<PollRecord, RepoError>;

    async fn find_poll(&self, id: Uuid) -> Result<Option<PollRecord>, RepoError>;

    async fn option_tallies(&self, poll_id: Uuid) -> Result<Vec<PollOptionTally>, RepoError>;

    async fn choice_of(&self, poll_id: Uuid, user_id: Uuid) -> Result<Option<Uuid>, RepoError>;

    async fn list_summaries(&self, filter: PollFilter) -> Result<Vec<PollSummary>, RepoError>;

    /// Upsert a vote, guarded by the poll still being open at `now`.
    async fn cast_vote(
        &self,
        poll_id: Uuid,
        user_id: Uuid,
        option_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<PollVoteOutcome, RepoError>;

    /// Close one poll; returns `true` if it was open.
    async fn close_poll(&self, id: Uuid, now: OffsetDateTime) -> Result<bool, RepoError>;

    /// Close every open poll due at `now` in one statement.
    async fn close_due(&self, now: OffsetDateTime) -> Result<Vec<ClosedPoll>, RepoError>;

    async fn voter_ids(&self, poll_id: Uuid) -> Result<Vec<Uuid>, RepoError>;
}

// ----- articles -----

#[derive(Debug, Clone)]
pub struct CreateArticleParams {
    pub author_id: Uuid,
    pub community_id: Option<Uuid>,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct UpdateArticleParams {
    pub id: Uuid,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    pub search: Option<String>,
    pub community_id: Option<Uuid>,
}

#[async_trait]
pub trait ArticlesRepo: Send + Sync {
    async fn create_article(&self, params: CreateArticleParams)
    -> Result<ArticleRecord, RepoError>;

    async fn find_article(&self, id: Uuid) -> Result<Option<ArticleRecord>, RepoError>;

    /// Newest first.
    async fn list_summaries(&self, filter: &ArticleFilter)
    -> Result<Vec<ArticleSummary>, RepoError>;

    async fn update_article(&self, params: UpdateArticleParams)
    -> Result<ArticleRecord, RepoError>;

    /// Delete the article with its comments and votes.
    async fn delete_article(&self, id: Uuid) -> Result<(), RepoError>;
}

// ----- notifications and challenges -----

#[async_trait]
pub trait NotificationsRepo: Send + Sync {
    async fn insert_many(
        &self,
        drafts: Vec<NotificationDraft>,
    ) -> Result<Vec<NotificationRecord>, RepoError>;

    async fn list_for(
        &self,
        recipient_id: Uuid,
        unread_only: bool,
        page: PageRequest<NotificationCursor>,
    ) -> Result<CursorPage<NotificationRecord>, RepoError>;

    async fn unread_count(&self, recipient_id: Uuid) -> Result<i64, RepoError>;

    /// Mark one notification read; `false` when it does not belong to the recipient.
    async fn mark_read(
        &self,
        id: Uuid,
        recipient_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<bool, RepoError>;

    async fn mark_all_read(&self, recipient_id: Uuid, now: OffsetDateTime)
    -> Result<u64, RepoError>;
}

#[derive(Debug, Clone, Copy)]
pub struct ProgressUpdate {
    pub user_id: Uuid,
    pub challenge_id: Uuid,
    /// Progress the caller read; `None` when no record existed.
    pub expected: Option<i32>,
    pub progress: i32,
    pub completed_at: Option<OffsetDateTime>,
    /// Reputation awarded with a completing write.
    pub reward_points: Option<i32>,
    pub now: OffsetDateTime,
}

#[async_trait]
pub trait ChallengesRepo: Send + Sync {
    async fn list_active(&self) -> Result<Vec<ChallengeRecord>, RepoError>;

    async fn active_for_action(
        &self,
        action: ChallengeAction,
    ) -> Result<Vec<ChallengeRecord>, RepoError>;

    async fn find_progress(
        &self,
        user_id: Uuid,
        challenge_id: Uuid,
    ) -> Result<Option<UserChallengeRecord>, RepoError>;

    /// Write progress only if the stored value still matches `expected` and
    /// the challenge is not yet complete. A completing write also credits
    /// `reward_points` to the user; both land or neither does.
    async fn compare_and_set_progress(&self, update: ProgressUpdate) -> Result<bool, RepoError>;

    async fn progress_of_user(&self, user_id: Uuid) -> Result<Vec<ChallengeProgress>, RepoError>;
}
