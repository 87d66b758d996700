//! In-memory repositories shared by the service unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::answers::AnswerService;
use crate::application::articles::ArticleService;
use crate::application::auth::Principal;
use crate::application::challenges::ChallengeService;
use crate::application::comments::CommentService;
use crate::application::communities::CommunityService;
use crate::application::events::EventBus;
use crate::application::fanout::Fanout;
use crate::application::notifications::NotificationService;
use crate::application::pagination::{CursorPage, NotificationCursor, PageRequest};
use crate::application::polls::PollService;
use crate::application::questions::QuestionService;
use crate::application::repos::*;
use crate::application::votes::VoteService;
use crate::domain::entities::*;
use crate::domain::notifications::NotificationDraft;
use crate::domain::sessions::SessionRecord;
use crate::domain::types::{ChallengeAction, ContentKind, PollStatus, VoteDirection};
use crate::domain::votes::{VoteOutcome, resolve_vote, weight};

pub(crate) fn principal(user: &UserRecord) -> Principal {
    Principal {
        user_id: user.id,
        username: user.username.clone(),
        display_name: user.display_name.clone(),
        session_id: Uuid::new_v4(),
    }
}

pub(crate) fn sample_challenge(
    action: ChallengeAction,
    target: i32,
    reward_points: i32,
) -> ChallengeRecord {
    ChallengeRecord {
        id: Uuid::new_v4(),
        slug: format!("{}-{target}", action.as_str()),
        title: format!("{} x{target}", action.as_str()),
        description: "test challenge".into(),
        action,
        target,
        reward_points,
        active: true,
        created_at: OffsetDateTime::now_utc(),
    }
}

/// Every in-memory store wired together, plus service builders.
pub(crate) struct Harness {
    pub users: Arc<MemoryUsers>,
    pub notifications: Arc<MemoryNotifications>,
    pub challenges: Arc<MemoryChallenges>,
    pub vote_store: Arc<MemoryVotes>,
    pub content: Arc<MemoryContent>,
    pub communities: Arc<MemoryCommunities>,
    pub polls: Arc<MemoryPolls>,
    pub events: EventBus,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_challenges(Vec::new())
    }

    pub fn with_challenges(challenges: Vec<ChallengeRecord>) -> Self {
        let users = Arc::new(MemoryUsers::default());
        let vote_store = Arc::new(MemoryVotes::default());
        Self {
            notifications: Arc::new(MemoryNotifications::default()),
            challenges: Arc::new(MemoryChallenges::with(users.clone(), challenges)),
            content: Arc::new(MemoryContent::new(users.clone(), vote_store.clone())),
            communities: Arc::new(MemoryCommunities::new(users.clone())),
            polls: Arc::new(MemoryPolls::new(users.clone())),
            events: EventBus::new(64),
            vote_store,
            users,
        }
    }

    pub fn fanout(&self) -> Fanout {
        let notifications = NotificationService::new(self.notifications.clone(), self.events.clone());
        let challenges = ChallengeService::new(self.challenges.clone(), notifications.clone());
        Fanout::new(notifications, challenges, self.events.clone())
    }

    pub fn votes(&self) -> VoteService {
        VoteService::new(
            self.content.clone(),
            self.content.clone(),
            self.content.clone(),
            self.content.clone(),
            self.vote_store.clone(),
            self.fanout(),
        )
    }

    pub fn questions(&self) -> QuestionService {
        QuestionService::new(
            self.content.clone(),
            self.content.clone(),
            self.content.clone(),
            self.vote_store.clone(),
            self.users.clone(),
            self.communities.clone(),
            self.fanout(),
        )
    }

    pub fn answers(&self) -> AnswerService {
        AnswerService::new(
            self.content.clone(),
            self.content.clone(),
            self.users.clone(),
            self.fanout(),
        )
    }

    pub fn comments(&self) -> CommentService {
        CommentService::new(
            self.content.clone(),
            self.content.clone(),
            self.content.clone(),
            self.content.clone(),
            self.users.clone(),
            self.fanout(),
        )
    }

    pub fn community_service(&self) -> CommunityService {
        CommunityService::new(self.communities.clone(), self.users.clone(), self.fanout())
    }

    pub fn poll_service(&self) -> PollService {
        PollService::new(
            self.polls.clone(),
            self.communities.clone(),
            self.users.clone(),
            self.fanout(),
        )
    }

    pub fn article_service(&self) -> ArticleService {
        ArticleService::new(
            self.content.clone(),
            self.content.clone(),
            self.vote_store.clone(),
            self.communities.clone(),
            self.users.clone(),
            self.fanout(),
        )
    }
}

// ----- users and sessions -----

#[derive(Default)]
pub(crate) struct MemoryUsers {
    users: Mutex<Vec<UserRecord>>,
    fail_reputation: AtomicBool,
}

impl MemoryUsers {
    pub fn insert(&self, username: &str) -> UserRecord {
        let now = OffsetDateTime::now_utc();
        let record = UserRecord {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            display_name: username.to_string(),
            bio: None,
            avatar_url: None,
            password_hash: Vec::new(),
            password_salt: Vec::new(),
            reputation: 0,
            created_at: now,
            updated_at: now,
        };
        self.users.lock().unwrap().push(record.clone());
        record
    }

    /// Make the next reputation change fail as if the user row were gone.
    pub fn fail_next_reputation_write(&self) {
        self.fail_reputation.store(true, Ordering::SeqCst);
    }

    /// Apply every delta or none of them.
    fn shift_reputation(&self, deltas: &[(Uuid, i64)]) -> Result<(), RepoError> {
        if self.fail_reputation.swap(false, Ordering::SeqCst) {
            return Err(RepoError::NotFound);
        }
        let mut users = self.users.lock().unwrap();
        if deltas
            .iter()
            .any(|(id, _)| !users.iter().any(|user| user.id == *id))
        {
            return Err(RepoError::NotFound);
        }
        for (id, delta) in deltas {
            if let Some(user) = users.iter_mut().find(|user| user.id == *id) {
                user.reputation += delta;
            }
        }
        Ok(())
    }

    pub fn reputation_of(&self, id: Uuid) -> i64 {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|user| user.id == id)
            .map(|user| user.reputation)
            .unwrap_or_default()
    }

    fn author(&self, id: Uuid) -> AuthorRef {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|user| user.id == id)
            .map(UserRecord::author_ref)
            .unwrap_or_else(|| AuthorRef {
                id,
                username: "deleted".into(),
                display_name: "deleted".into(),
            })
    }
}

#[async_trait]
impl UsersRepo for MemoryUsers {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|user| user.username == params.username) {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".into(),
            });
        }
        if users.iter().any(|user| user.email == params.email) {
            return Err(RepoError::Duplicate {
                constraint: "users_email_key".into(),
            });
        }
        let now = OffsetDateTime::now_utc();
        let record = UserRecord {
            id: Uuid::new_v4(),
            username: params.username,
            email: params.email,
            display_name: params.display_name,
            bio: None,
            avatar_url: None,
            password_hash: params.password_hash,
            password_salt: params.password_salt,
            reputation: 0,
            created_at: now,
            updated_at: now,
        };
        users.push(record.clone());
        Ok(record)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|user| user.id == id)
            .cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn list_users(
        &self,
        search: Option<&str>,
        limit: u32,
    ) -> Result<Vec<UserRecord>, RepoError> {
        let needle = search.map(str::to_lowercase);
        let mut users: Vec<UserRecord> = self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|user| {
                needle.as_deref().is_none_or(|needle| {
                    user.username.contains(needle)
                        || user.display_name.to_lowercase().contains(needle)
                })
            })
            .cloned()
            .collect();
        users.sort_by(|a, b| b.reputation.cmp(&a.reputation));
        users.truncate(limit as usize);
        Ok(users)
    }

    async fn update_profile(&self, params: UpdateProfileParams) -> Result<UserRecord, RepoError> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .iter_mut()
            .find(|user| user.id == params.id)
            .ok_or(RepoError::NotFound)?;
        user.display_name = params.display_name;
        user.bio = params.bio;
        user.avatar_url = params.avatar_url;
        user.updated_at = OffsetDateTime::now_utc();
        Ok(user.clone())
    }
}

#[derive(Default)]
pub(crate) struct MemorySessions {
    sessions: Mutex<Vec<SessionRecord>>,
}

#[async_trait]
impl SessionsRepo for MemorySessions {
    async fn create_session(
        &self,
        params: CreateSessionParams,
    ) -> Result<SessionRecord, RepoError> {
        let record = SessionRecord {
            id: Uuid::new_v4(),
            user_id: params.user_id,
            prefix: params.prefix,
            hashed_secret: params.hashed_secret,
            expires_at: params.expires_at,
            revoked_at: None,
            last_used_at: None,
            created_at: OffsetDateTime::now_utc(),
        };
        self.sessions.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<SessionRecord>, RepoError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .find(|session| session.prefix == prefix)
            .cloned())
    }

    async fn revoke_session(&self, id: Uuid, now: OffsetDateTime) -> Result<(), RepoError> {
        if let Some(session) = self
            .sessions
            .lock()
            .unwrap()
            .iter_mut()
            .find(|session| session.id == id)
        {
            session.revoked_at.get_or_insert(now);
        }
        Ok(())
    }

    async fn touch_session(&self, id: Uuid, now: OffsetDateTime) -> Result<(), RepoError> {
        if let Some(session) = self
            .sessions
            .lock()
            .unwrap()
            .iter_mut()
            .find(|session| session.id == id)
        {
            session.last_used_at = Some(now);
        }
        Ok(())
    }
}

// ----- notifications and challenges -----

#[derive(Default)]
pub(crate) struct MemoryNotifications {
    records: Mutex<Vec<NotificationRecord>>,
}

impl MemoryNotifications {
    pub fn count_for(&self, recipient_id: Uuid) -> usize {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|record| record.recipient_id == recipient_id)
            .count()
    }
}

#[async_trait]
impl NotificationsRepo for MemoryNotifications {
    async fn insert_many(
        &self,
        drafts: Vec<NotificationDraft>,
    ) -> Result<Vec<NotificationRecord>, RepoError> {
        let now = OffsetDateTime::now_utc();
        let created: Vec<NotificationRecord> = drafts
            .into_iter()
            .map(|draft| NotificationRecord {
                id: Uuid::new_v4(),
                recipient_id: draft.recipient_id,
                actor_id: draft.actor_id,
                kind: draft.kind,
                entity_kind: draft.entity_kind,
                entity_id: draft.entity_id,
                message: draft.message,
                read_at: None,
                created_at: now,
            })
            .collect();
        self.records.lock().unwrap().extend(created.iter().cloned());
        Ok(created)
    }

    async fn list_for(
        &self,
        recipient_id: Uuid,
        unread_only: bool,
        page: PageRequest<NotificationCursor>,
    ) -> Result<CursorPage<NotificationRecord>, RepoError> {
        let mut items: Vec<NotificationRecord> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|record| record.recipient_id == recipient_id)
            .filter(|record| !unread_only || record.read_at.is_none())
            .filter(|record| {
                page.cursor.is_none_or(|cursor| {
                    (record.created_at, record.id) < (cursor.created_at(), cursor.id())
                })
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let limit = page.limit as usize;
        let next_cursor = (items.len() > limit)
            .then(|| {
                let last = &items[limit - 1];
                NotificationCursor::new(last.created_at, last.id).encode()
            });
        items.truncate(limit);
        Ok(CursorPage::new(items, next_cursor))
    }

    async fn unread_count(&self, recipient_id: Uuid) -> Result<i64, RepoError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|record| record.recipient_id == recipient_id && record.read_at.is_none())
            .count() as i64)
    }

    async fn mark_read(
        &self,
        id: Uuid,
        recipient_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<bool, RepoError> {
        let mut records = self.records.lock().unwrap();
        match records
            .iter_mut()
            .find(|record| record.id == id && record.recipient_id == recipient_id)
        {
            Some(record) => {
                record.read_at.get_or_insert(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_read(
        &self,
        recipient_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<u64, RepoError> {
        let mut updated = 0;
        for record in self.records.lock().unwrap().iter_mut() {
            if record.recipient_id == recipient_id && record.read_at.is_none() {
                record.read_at = Some(now);
                updated += 1;
            }
        }
        Ok(updated)
    }
}

pub(crate) struct MemoryChallenges {
    users: Arc<MemoryUsers>,
    challenges: Vec<ChallengeRecord>,
    progress: Mutex<HashMap<(Uuid, Uuid), UserChallengeRecord>>,
    failing_writes: AtomicUsize,
}

impl MemoryChallenges {
    pub fn with(users: Arc<MemoryUsers>, challenges: Vec<ChallengeRecord>) -> Self {
        Self {
            users,
            challenges,
            progress: Mutex::default(),
            failing_writes: AtomicUsize::new(0),
        }
    }

    pub fn progress(&self, user_id: Uuid, challenge_id: Uuid) -> Option<UserChallengeRecord> {
        self.progress
            .lock()
            .unwrap()
            .get(&(user_id, challenge_id))
            .cloned()
    }

    /// Make the next `count` compare-and-set calls report a lost race.
    pub fn fail_next_writes(&self, count: usize) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChallengesRepo for MemoryChallenges {
    async fn list_active(&self) -> Result<Vec<ChallengeRecord>, RepoError> {
        Ok(self
            .challenges
            .iter()
            .filter(|challenge| challenge.active)
            .cloned()
            .collect())
    }

    async fn active_for_action(
        &self,
        action: ChallengeAction,
    ) -> Result<Vec<ChallengeRecord>, RepoError> {
        Ok(self
            .challenges
            .iter()
            .filter(|challenge| challenge.active && challenge.action == action)
            .cloned()
            .collect())
    }

    async fn find_progress(
        &self,
        user_id: Uuid,
        challenge_id: Uuid,
    ) -> Result<Option<UserChallengeRecord>, RepoError> {
        Ok(self.progress(user_id, challenge_id))
    }

    async fn compare_and_set_progress(&self, update: ProgressUpdate) -> Result<bool, RepoError> {
        if self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
        {
            return Ok(false);
        }

        let mut progress = self.progress.lock().unwrap();
        let key = (update.user_id, update.challenge_id);
        let matches = match (progress.get(&key), update.expected) {
            (None, None) => true,
            (Some(current), Some(expected)) => {
                current.progress == expected && current.completed_at.is_none()
            }
            _ => false,
        };
        if matches {
            if let Some(points) = update.reward_points {
                self.users
                    .shift_reputation(&[(update.user_id, i64::from(points))])?;
            }
            progress.insert(
                key,
                UserChallengeRecord {
                    user_id: update.user_id,
                    challenge_id: update.challenge_id,
                    progress: update.progress,
                    completed_at: update.completed_at,
                    updated_at: update.now,
                },
            );
        }
        Ok(matches)
    }

    async fn progress_of_user(&self, user_id: Uuid) -> Result<Vec<ChallengeProgress>, RepoError> {
        let progress = self.progress.lock().unwrap();
        Ok(self
            .challenges
            .iter()
            .filter_map(|challenge| {
                progress
                    .get(&(user_id, challenge.id))
                    .map(|record| ChallengeProgress {
                        challenge: challenge.clone(),
                        progress: record.progress,
                        completed_at: record.completed_at,
                    })
            })
            .collect())
    }
}

// ----- votes -----

#[derive(Default)]
pub(crate) struct MemoryVotes {
    votes: Mutex<HashMap<(ContentKind, Uuid, Uuid), VoteDirection>>,
    // voter history per target: whether they ever up-voted
    history: Mutex<HashMap<(ContentKind, Uuid, Uuid), bool>>,
}

impl MemoryVotes {
    fn score_of(&self, kind: ContentKind, target_id: Uuid) -> i64 {
        self.votes
            .lock()
            .unwrap()
            .iter()
            .filter(|((k, id, _), _)| *k == kind && *id == target_id)
            .map(|(_, direction)| weight(*direction))
            .sum()
    }

    fn direction_of(&self, kind: ContentKind, target_id: Uuid, user_id: Uuid) -> Option<VoteDirection> {
        self.votes
            .lock()
            .unwrap()
            .get(&(kind, target_id, user_id))
            .copied()
    }
}

#[async_trait]
impl VotesRepo for MemoryVotes {
    async fn toggle_vote(
        &self,
        target_kind: ContentKind,
        target_id: Uuid,
        user_id: Uuid,
        requested: VoteDirection,
    ) -> Result<VoteOutcome, RepoError> {
        let mut votes = self.votes.lock().unwrap();
        let mut history = self.history.lock().unwrap();
        let key = (target_kind, target_id, user_id);
        let previous = history.get(&key).copied();
        let change = resolve_vote(votes.get(&key).copied(), requested);
        let outcome = VoteOutcome::new(change, previous.is_some(), previous.unwrap_or(false));
        history.insert(key, previous.unwrap_or(false) || outcome.first_upvote);
        match change.resulting() {
            Some(direction) => {
                votes.insert(key, direction);
            }
            None => {
                votes.remove(&key);
            }
        }
        Ok(outcome)
    }

    async fn score(&self, target_kind: ContentKind, target_id: Uuid) -> Result<i64, RepoError> {
        Ok(self.score_of(target_kind, target_id))
    }

    async fn vote_of(
        &self,
        target_kind: ContentKind,
        target_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<VoteDirection>, RepoError> {
        Ok(self.direction_of(target_kind, target_id, user_id))
    }
}

// ----- questions, answers, comments, articles -----

pub(crate) struct MemoryContent {
    users: Arc<MemoryUsers>,
    votes: Arc<MemoryVotes>,
    questions: Mutex<Vec<QuestionRecord>>,
    question_tags: Mutex<HashMap<Uuid, Vec<String>>>,
    views: Mutex<HashSet<(Uuid, Uuid)>>,
    answers: Mutex<Vec<AnswerRecord>>,
    comments: Mutex<Vec<CommentRecord>>,
    articles: Mutex<Vec<ArticleRecord>>,
}

impl MemoryContent {
    pub fn new(users: Arc<MemoryUsers>, votes: Arc<MemoryVotes>) -> Self {
        Self {
            users,
            votes,
            questions: Mutex::default(),
            question_tags: Mutex::default(),
            views: Mutex::default(),
            answers: Mutex::default(),
            comments: Mutex::default(),
            articles: Mutex::default(),
        }
    }

    pub fn question(&self, author_id: Uuid, title: &str) -> Uuid {
        let now = OffsetDateTime::now_utc();
        let id = Uuid::new_v4();
        self.questions.lock().unwrap().push(QuestionRecord {
            id,
            author_id,
            community_id: None,
            title: title.to_string(),
            body: "<p>body</p>".into(),
            views: 0,
            accepted_answer_id: None,
            created_at: now,
            updated_at: now,
        });
        id
    }

    pub fn answer(&self, question_id: Uuid, author_id: Uuid) -> Uuid {
        let now = OffsetDateTime::now_utc();
        let id = Uuid::new_v4();
        self.answers.lock().unwrap().push(AnswerRecord {
            id,
            question_id,
            author_id,
            body: "<p>answer</p>".into(),
            created_at: now,
            updated_at: now,
        });
        id
    }

    pub fn article(&self, author_id: Uuid) -> Uuid {
        let now = OffsetDateTime::now_utc();
        let id = Uuid::new_v4();
        self.articles.lock().unwrap().push(ArticleRecord {
            id,
            author_id,
            community_id: None,
            title: "An article".into(),
            body: "<p>article</p>".into(),
            created_at: now,
            updated_at: now,
        });
        id
    }

    fn comment_count(&self, kind: ContentKind, target_id: Uuid) -> i64 {
        self.comments
            .lock()
            .unwrap()
            .iter()
            .filter(|comment| comment.target_kind == kind && comment.target_id == target_id)
            .count() as i64
    }
}

#[async_trait]
impl QuestionsRepo for MemoryContent {
    async fn create_question(
        &self,
        params: CreateQuestionParams,
    ) -> Result<QuestionRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let record = QuestionRecord {
            id: Uuid::new_v4(),
            author_id: params.author_id,
            community_id: params.community_id,
            title: params.title,
            body: params.body,
            views: 0,
            accepted_answer_id: None,
            created_at: now,
            updated_at: now,
        };
        self.questions.lock().unwrap().push(record.clone());
        self.question_tags
            .lock()
            .unwrap()
            .insert(record.id, params.tags);
        Ok(record)
    }

    async fn find_question(&self, id: Uuid) -> Result<Option<QuestionRecord>, RepoError> {
        Ok(self
            .questions
            .lock()
            .unwrap()
            .iter()
            .find(|question| question.id == id)
            .cloned())
    }

    async fn question_tags(&self, id: Uuid) -> Result<Vec<String>, RepoError> {
        Ok(self
            .question_tags
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_summaries(
        &self,
        filter: &QuestionFilter,
    ) -> Result<Vec<QuestionSummary>, RepoError> {
        let questions = self.questions.lock().unwrap().clone();
        let tags = self.question_tags.lock().unwrap().clone();
        let answers = self.answers.lock().unwrap().clone();
        let needle = filter.search.as_deref().map(str::to_lowercase);

        Ok(questions
            .into_iter()
            .filter(|question| {
                filter
                    .community_id
                    .is_none_or(|id| question.community_id == Some(id))
            })
            .filter(|question| {
                needle.as_deref().is_none_or(|needle| {
                    question.title.to_lowercase().contains(needle)
                        || question.body.to_lowercase().contains(needle)
                })
            })
            .filter(|question| {
                filter.tag.as_deref().is_none_or(|tag| {
                    tags.get(&question.id)
                        .is_some_and(|names| names.iter().any(|name| name == tag))
                })
            })
            .map(|question| {
                let own_answers: Vec<&AnswerRecord> = answers
                    .iter()
                    .filter(|answer| answer.question_id == question.id)
                    .collect();
                let last_activity_at = own_answers
                    .iter()
                    .map(|answer| answer.created_at)
                    .max()
                    .map_or(question.created_at, |latest| latest.max(question.created_at));
                QuestionSummary {
                    id: question.id,
                    title: question.title.clone(),
                    author: self.users.author(question.author_id),
                    community_id: question.community_id,
                    tags: tags.get(&question.id).cloned().unwrap_or_default(),
                    views: question.views,
                    score: self.votes.score_of(ContentKind::Question, question.id),
                    answer_count: own_answers.len() as i64,
                    has_accepted_answer: question.accepted_answer_id.is_some(),
                    created_at: question.created_at,
                    last_activity_at,
                }
            })
            .collect())
    }

    async fn update_question(
        &self,
        params: UpdateQuestionParams,
    ) -> Result<QuestionRecord, RepoError> {
        let updated = {
            let mut questions = self.questions.lock().unwrap();
            let question = questions
                .iter_mut()
                .find(|question| question.id == params.id)
                .ok_or(RepoError::NotFound)?;
            question.title = params.title;
            question.body = params.body;
            question.updated_at = OffsetDateTime::now_utc();
            question.clone()
        };
        if let Some(tags) = params.tags {
            self.question_tags.lock().unwrap().insert(params.id, tags);
        }
        Ok(updated)
    }

    async fn delete_question(&self, id: Uuid) -> Result<(), RepoError> {
        self.questions
            .lock()
            .unwrap()
            .retain(|question| question.id != id);
        self.answers
            .lock()
            .unwrap()
            .retain(|answer| answer.question_id != id);
        self.question_tags.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn record_view(&self, question_id: Uuid, viewer_id: Uuid) -> Result<bool, RepoError> {
        if !self.views.lock().unwrap().insert((question_id, viewer_id)) {
            return Ok(false);
        }
        if let Some(question) = self
            .questions
            .lock()
            .unwrap()
            .iter_mut()
            .find(|question| question.id == question_id)
        {
            question.views += 1;
        }
        Ok(true)
    }

    async fn swap_accepted_answer(&self, swap: AcceptedAnswerSwap) -> Result<bool, RepoError> {
        let mut questions = self.questions.lock().unwrap();
        let question = questions
            .iter_mut()
            .find(|question| question.id == swap.question_id)
            .ok_or(RepoError::NotFound)?;
        if question.accepted_answer_id != swap.expected {
            return Ok(false);
        }
        self.users.shift_reputation(&swap.reputation_deltas())?;
        question.accepted_answer_id = swap.accepted;
        Ok(true)
    }
}

#[async_trait]
impl AnswersRepo for MemoryContent {
    async fn create_answer(
        &self,
        question_id: Uuid,
        author_id: Uuid,
        body: String,
    ) -> Result<AnswerRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let record = AnswerRecord {
            id: Uuid::new_v4(),
            question_id,
            author_id,
            body,
            created_at: now,
            updated_at: now,
        };
        self.answers.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn find_answer(&self, id: Uuid) -> Result<Option<AnswerRecord>, RepoError> {
        Ok(self
            .answers
            .lock()
            .unwrap()
            .iter()
            .find(|answer| answer.id == id)
            .cloned())
    }

    async fn list_for_question(
        &self,
        question_id: Uuid,
        viewer_id: Option<Uuid>,
    ) -> Result<Vec<AnswerView>, RepoError> {
        let accepted = self
            .questions
            .lock()
            .unwrap()
            .iter()
            .find(|question| question.id == question_id)
            .and_then(|question| question.accepted_answer_id);
        let answers = self.answers.lock().unwrap().clone();

        let mut views: Vec<AnswerView> = answers
            .into_iter()
            .filter(|answer| answer.question_id == question_id)
            .map(|answer| AnswerView {
                id: answer.id,
                question_id: answer.question_id,
                author: self.users.author(answer.author_id),
                score: self.votes.score_of(ContentKind::Answer, answer.id),
                accepted: accepted == Some(answer.id),
                viewer_vote: viewer_id.and_then(|viewer| {
                    self.votes.direction_of(ContentKind::Answer, answer.id, viewer)
                }),
                body: answer.body,
                created_at: answer.created_at,
                updated_at: answer.updated_at,
            })
            .collect();
        views.sort_by(|a, b| {
            b.accepted
                .cmp(&a.accepted)
                .then(b.score.cmp(&a.score))
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(views)
    }

    async fn delete_answer(&self, id: Uuid) -> Result<(), RepoError> {
        self.answers.lock().unwrap().retain(|answer| answer.id != id);
        for question in self.questions.lock().unwrap().iter_mut() {
            if question.accepted_answer_id == Some(id) {
                question.accepted_answer_id = None;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CommentsRepo for MemoryContent {
    async fn create_comment(
        &self,
        target_kind: ContentKind,
        target_id: Uuid,
        author_id: Uuid,
        body: String,
    ) -> Result<CommentRecord, RepoError> {
        let record = CommentRecord {
            id: Uuid::new_v4(),
            target_kind,
            target_id,
            author_id,
            body,
            created_at: OffsetDateTime::now_utc(),
        };
        self.comments.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn find_comment(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError> {
        Ok(self
            .comments
            .lock()
            .unwrap()
            .iter()
            .find(|comment| comment.id == id)
            .cloned())
    }

    async fn list_for_target(
        &self,
        target_kind: ContentKind,
        target_id: Uuid,
    ) -> Result<Vec<CommentView>, RepoError> {
        let comments = self.comments.lock().unwrap().clone();
        Ok(comments
            .into_iter()
            .filter(|comment| comment.target_kind == target_kind && comment.target_id == target_id)
            .map(|comment| CommentView {
                id: comment.id,
                target_kind: comment.target_kind,
                target_id: comment.target_id,
                author: self.users.author(comment.author_id),
                score: self.votes.score_of(ContentKind::Comment, comment.id),
                body: comment.body,
                created_at: comment.created_at,
            })
            .collect())
    }

    async fn delete_comment(&self, id: Uuid) -> Result<(), RepoError> {
        self.comments
            .lock()
            .unwrap()
            .retain(|comment| comment.id != id);
        Ok(())
    }
}

#[async_trait]
impl ArticlesRepo for MemoryContent {
    async fn create_article(
        &self,
        params: CreateArticleParams,
    ) -> Result<ArticleRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let record = ArticleRecord {
            id: Uuid::new_v4(),
            author_id: params.author_id,
            community_id: params.community_id,
            title: params.title,
            body: params.body,
            created_at: now,
            updated_at: now,
        };
        self.articles.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn find_article(&self, id: Uuid) -> Result<Option<ArticleRecord>, RepoError> {
        Ok(self
            .articles
            .lock()
            .unwrap()
            .iter()
            .find(|article| article.id == id)
            .cloned())
    }

    async fn list_summaries(
        &self,
        filter: &ArticleFilter,
    ) -> Result<Vec<ArticleSummary>, RepoError> {
        let mut articles = self.articles.lock().unwrap().clone();
        articles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(articles
            .into_iter()
            .filter(|article| {
                filter
                    .community_id
                    .is_none_or(|id| article.community_id == Some(id))
            })
            .map(|article| ArticleSummary {
                id: article.id,
                title: article.title,
                author: self.users.author(article.author_id),
                community_id: article.community_id,
                score: self.votes.score_of(ContentKind::Article, article.id),
                comment_count: self.comment_count(ContentKind::Article, article.id),
                created_at: article.created_at,
            })
            .collect())
    }

    async fn update_article(
        &self,
        params: UpdateArticleParams,
    ) -> Result<ArticleRecord, RepoError> {
        let mut articles = self.articles.lock().unwrap();
        let article = articles
            .iter_mut()
            .find(|article| article.id == params.id)
            .ok_or(RepoError::NotFound)?;
        article.title = params.title;
        article.body = params.body;
        article.updated_at = OffsetDateTime::now_utc();
        Ok(article.clone())
    }

    async fn delete_article(&self, id: Uuid) -> Result<(), RepoError> {
        self.articles
            .lock()
            .unwrap()
            .retain(|article| article.id != id);
        Ok(())
    }
}

// ----- communities -----

pub(crate) struct MemoryCommunities {
    users: Arc<MemoryUsers>,
    communities: Mutex<Vec<CommunityRecord>>,
    members: Mutex<Vec<(Uuid, Uuid, OffsetDateTime)>>,
}

impl MemoryCommunities {
    pub fn new(users: Arc<MemoryUsers>) -> Self {
        Self {
            users,
            communities: Mutex::default(),
            members: Mutex::default(),
        }
    }

    pub fn community(&self, owner_id: Uuid, name: &str) -> Uuid {
        let record = self.insert(CreateCommunityParams {
            slug: name.to_lowercase().replace(' ', "-"),
            name: name.to_string(),
            description: String::new(),
            owner_id,
        });
        record.id
    }

    pub fn join(&self, community_id: Uuid, user_id: Uuid) {
        self.add(community_id, user_id);
    }

    fn insert(&self, params: CreateCommunityParams) -> CommunityRecord {
        let now = OffsetDateTime::now_utc();
        let record = CommunityRecord {
            id: Uuid::new_v4(),
            slug: params.slug,
            name: params.name,
            description: params.description,
            owner_id: params.owner_id,
            created_at: now,
            updated_at: now,
        };
        self.communities.lock().unwrap().push(record.clone());
        self.add(record.id, record.owner_id);
        record
    }

    fn add(&self, community_id: Uuid, user_id: Uuid) -> bool {
        let mut members = self.members.lock().unwrap();
        if members
            .iter()
            .any(|(community, user, _)| *community == community_id && *user == user_id)
        {
            return false;
        }
        members.push((community_id, user_id, OffsetDateTime::now_utc()));
        true
    }

    fn member_count(&self, community_id: Uuid) -> i64 {
        self.members
            .lock()
            .unwrap()
            .iter()
            .filter(|(community, _, _)| *community == community_id)
            .count() as i64
    }
}

#[async_trait]
impl CommunitiesRepo for MemoryCommunities {
    async fn create_community(
        &self,
        params: CreateCommunityParams,
    ) -> Result<CommunityRecord, RepoError> {
        let duplicate = self.communities.lock().unwrap().iter().any(|community| {
            community.slug == params.slug || community.name.eq_ignore_ascii_case(&params.name)
        });
        if duplicate {
            return Err(RepoError::Duplicate {
                constraint: "communities_name_key".into(),
            });
        }
        Ok(self.insert(params))
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool, RepoError> {
        Ok(self
            .communities
            .lock()
            .unwrap()
            .iter()
            .any(|community| community.slug == slug))
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<CommunityRecord>, RepoError> {
        Ok(self
            .communities
            .lock()
            .unwrap()
            .iter()
            .find(|community| community.slug == slug)
            .cloned())
    }

    async fn find_community(&self, id: Uuid) -> Result<Option<CommunityRecord>, RepoError> {
        Ok(self
            .communities
            .lock()
            .unwrap()
            .iter()
            .find(|community| community.id == id)
            .cloned())
    }

    async fn list_summaries(
        &self,
        search: Option<&str>,
    ) -> Result<Vec<CommunitySummary>, RepoError> {
        let needle = search.map(str::to_lowercase);
        let communities = self.communities.lock().unwrap().clone();
        Ok(communities
            .into_iter()
            .filter(|community| {
                needle
                    .as_deref()
                    .is_none_or(|needle| community.name.to_lowercase().contains(needle))
            })
            .map(|community| CommunitySummary {
                member_count: self.member_count(community.id),
                id: community.id,
                slug: community.slug,
                name: community.name,
                description: community.description,
            })
            .collect())
    }

    async fn counts(&self, id: Uuid) -> Result<CommunityCounts, RepoError> {
        Ok(CommunityCounts {
            members: self.member_count(id),
            ..CommunityCounts::default()
        })
    }

    async fn is_member(&self, community_id: Uuid, user_id: Uuid) -> Result<bool, RepoError> {
        Ok(self
            .members
            .lock()
            .unwrap()
            .iter()
            .any(|(community, user, _)| *community == community_id && *user == user_id))
    }

    async fn add_member(&self, community_id: Uuid, user_id: Uuid) -> Result<bool, RepoError> {
        Ok(self.add(community_id, user_id))
    }

    async fn remove_member(&self, community_id: Uuid, user_id: Uuid) -> Result<bool, RepoError> {
        let mut members = self.members.lock().unwrap();
        let before = members.len();
        members.retain(|(community, user, _)| !(*community == community_id && *user == user_id));
        Ok(members.len() < before)
    }

    async fn members(&self, community_id: Uuid) -> Result<Vec<CommunityMember>, RepoError> {
        let members = self.members.lock().unwrap().clone();
        Ok(members
            .into_iter()
            .filter(|(community, _, _)| *community == community_id)
            .map(|(_, user_id, joined_at)| CommunityMember {
                user: self.users.author(user_id),
                joined_at,
            })
            .collect())
    }

    async fn member_ids(&self, community_id: Uuid) -> Result<Vec<Uuid>, RepoError> {
        Ok(self
            .members
            .lock()
            .unwrap()
            .iter()
            .filter(|(community, _, _)| *community == community_id)
            .map(|(_, user, _)| *user)
            .collect())
    }
}

// ----- polls -----

pub(crate) struct MemoryPolls {
    users: Arc<MemoryUsers>,
    polls: Mutex<Vec<PollRecord>>,
    options: Mutex<Vec<(Uuid, Uuid, String, i32)>>,
    votes: Mutex<HashMap<(Uuid, Uuid), Uuid>>,
}

impl MemoryPolls {
    pub fn new(users: Arc<MemoryUsers>) -> Self {
        Self {
            users,
            polls: Mutex::default(),
            options: Mutex::default(),
            votes: Mutex::default(),
        }
    }

    fn voters(&self, poll_id: Uuid) -> Vec<Uuid> {
        self.votes
            .lock()
            .unwrap()
            .keys()
            .filter(|(poll, _)| *poll == poll_id)
            .map(|(_, user)| *user)
            .collect()
    }
}

#[async_trait]
impl PollsRepo for MemoryPolls {
    async fn create_poll(&self, params: CreatePollParams) -> Result<PollRecord, RepoError> {
        let record = PollRecord {
            id: Uuid::new_v4(),
            author_id: params.author_id,
            community_id: params.community_id,
            question: params.question,
            status: PollStatus::Open,
            closes_at: params.closes_at,
            closed_at: None,
            created_at: OffsetDateTime::now_utc(),
        };
        self.polls.lock().unwrap().push(record.clone());
        let mut options = self.options.lock().unwrap();
        for (position, label) in params.options.into_iter().enumerate() {
            options.push((record.id, Uuid::new_v4(), label, position as i32));
        }
        Ok(record)
    }

    async fn find_poll(&self, id: Uuid) -> Result<Option<PollRecord>, RepoError> {
        Ok(self
            .polls
            .lock()
            .unwrap()
            .iter()
            .find(|poll| poll.id == id)
            .cloned())
    }

    async fn option_tallies(&self, poll_id: Uuid) -> Result<Vec<PollOptionTally>, RepoError> {
        let votes = self.votes.lock().unwrap().clone();
        let options = self.options.lock().unwrap().clone();
        Ok(options
            .into_iter()
            .filter(|(poll, _, _, _)| *poll == poll_id)
            .map(|(_, id, label, position)| PollOptionTally {
                votes: votes.values().filter(|choice| **choice == id).count() as i64,
                id,
                label,
                position,
            })
            .collect())
    }

    async fn choice_of(&self, poll_id: Uuid, user_id: Uuid) -> Result<Option<Uuid>, RepoError> {
        Ok(self.votes.lock().unwrap().get(&(poll_id, user_id)).copied())
    }

    async fn list_summaries(&self, filter: PollFilter) -> Result<Vec<PollSummary>, RepoError> {
        let polls = self.polls.lock().unwrap().clone();
        Ok(polls
            .into_iter()
            .filter(|poll| filter.status.is_none_or(|status| poll.status == status))
            .filter(|poll| {
                filter
                    .community_id
                    .is_none_or(|id| poll.community_id == Some(id))
            })
            .map(|poll| PollSummary {
                id: poll.id,
                author: self.users.author(poll.author_id),
                community_id: poll.community_id,
                total_votes: self.voters(poll.id).len() as i64,
                question: poll.question,
                status: poll.status,
                closes_at: poll.closes_at,
                created_at: poll.created_at,
            })
            .collect())
    }

    async fn cast_vote(
        &self,
        poll_id: Uuid,
        user_id: Uuid,
        option_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<PollVoteOutcome, RepoError> {
        let open = self
            .polls
            .lock()
            .unwrap()
            .iter()
            .any(|poll| poll.id == poll_id && poll.accepts_votes_at(now));
        if !open {
            return Ok(PollVoteOutcome::Closed);
        }
        let previous = self
            .votes
            .lock()
            .unwrap()
            .insert((poll_id, user_id), option_id);
        Ok(match previous {
            None => PollVoteOutcome::Cast,
            Some(_) => PollVoteOutcome::Changed,
        })
    }

    async fn close_poll(&self, id: Uuid, now: OffsetDateTime) -> Result<bool, RepoError> {
        let mut polls = self.polls.lock().unwrap();
        match polls
            .iter_mut()
            .find(|poll| poll.id == id && poll.status == PollStatus::Open)
        {
            Some(poll) => {
                poll.status = PollStatus::Closed;
                poll.closed_at = Some(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn close_due(&self, now: OffsetDateTime) -> Result<Vec<ClosedPoll>, RepoError> {
        let closed: Vec<PollRecord> = {
            let mut polls = self.polls.lock().unwrap();
            polls
                .iter_mut()
                .filter(|poll| poll.status == PollStatus::Open && poll.closes_at <= now)
                .map(|poll| {
                    poll.status = PollStatus::Closed;
                    poll.closed_at = Some(now);
                    poll.clone()
                })
                .collect()
        };
        Ok(closed
            .into_iter()
            .map(|poll| ClosedPoll {
                voter_ids: self.voters(poll.id),
                id: poll.id,
                author_id: poll.author_id,
                question: poll.question,
            })
            .collect())
    }

    async fn voter_ids(&self, poll_id: Uuid) -> Result<Vec<Uuid>, RepoError> {
        Ok(self.voters(poll_id))
    }
}
