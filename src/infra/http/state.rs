use std::sync::Arc;
use std::time::Duration;

use crate::application::answers::AnswerService;
use crate::application::articles::ArticleService;
use crate::application::auth::AuthService;
use crate::application::challenges::ChallengeService;
use crate::application::comments::CommentService;
use crate::application::communities::CommunityService;
use crate::application::events::EventBus;
use crate::application::fanout::Fanout;
use crate::application::notifications::NotificationService;
use crate::application::polls::PollService;
use crate::application::questions::QuestionService;
use crate::application::tags::TagService;
use crate::application::users::UserService;
use crate::application::votes::VoteService;
use crate::config::Settings;
use crate::infra::db::PostgresRepositories;

use super::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct HttpState {
    pub auth: Arc<AuthService>,
    pub users: Arc<UserService>,
    pub questions: Arc<QuestionService>,
    pub answers: Arc<AnswerService>,
    pub comments: Arc<CommentService>,
    pub votes: Arc<VoteService>,
    pub tags: Arc<TagService>,
    pub communities: Arc<CommunityService>,
    pub polls: Arc<PollService>,
    pub articles: Arc<ArticleService>,
    pub notifications: Arc<NotificationService>,
    pub challenges: Arc<ChallengeService>,
    pub events: EventBus,
    pub db: Arc<PostgresRepositories>,
    pub rate_limiter: Arc<RateLimiter>,
    pub keep_alive: Duration,
}

/// Tunables the HTTP surface needs beyond the repositories.
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub session_ttl: time::Duration,
    pub event_capacity: usize,
    pub keep_alive: Duration,
    pub rate_window: Duration,
    pub rate_max_requests: u32,
}

impl From<&Settings> for HttpOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            session_ttl: settings.auth.session_ttl,
            event_capacity: settings.events.channel_capacity.get(),
            keep_alive: settings.events.keep_alive,
            rate_window: Duration::from_secs(u64::from(settings.rate_limit.window_seconds.get())),
            rate_max_requests: settings.rate_limit.max_requests.get(),
        }
    }
}

impl HttpState {
    /// Wire every service against a single Postgres repository handle.
    pub fn new(db: PostgresRepositories, options: HttpOptions) -> Self {
        let repo = Arc::new(db);
        let events = EventBus::new(options.event_capacity);

        let notifications = NotificationService::new(repo.clone(), events.clone());
        let challenges = ChallengeService::new(repo.clone(), notifications.clone());
        let fanout = Fanout::new(notifications.clone(), challenges.clone(), events.clone());

        Self {
            auth: Arc::new(AuthService::new(
                repo.clone(),
                repo.clone(),
                options.session_ttl,
            )),
            users: Arc::new(UserService::new(repo.clone())),
            questions: Arc::new(QuestionService::new(
                repo.clone(),
                repo.clone(),
                repo.clone(),
                repo.clone(),
                repo.clone(),
                repo.clone(),
                fanout.clone(),
            )),
            answers: Arc::new(AnswerService::new(
                repo.clone(),
                repo.clone(),
                repo.clone(),
                fanout.clone(),
            )),
            comments: Arc::new(CommentService::new(
                repo.clone(),
                repo.clone(),
                repo.clone(),
                repo.clone(),
                repo.clone(),
                fanout.clone(),
            )),
            votes: Arc::new(VoteService::new(
                repo.clone(),
                repo.clone(),
                repo.clone(),
                repo.clone(),
                repo.clone(),
                fanout.clone(),
            )),
            tags: Arc::new(TagService::new(repo.clone(), repo.clone())),
            communities: Arc::new(CommunityService::new(
                repo.clone(),
                repo.clone(),
                fanout.clone(),
            )),
            polls: Arc::new(PollService::new(
                repo.clone(),
                repo.clone(),
                repo.clone(),
                fanout.clone(),
            )),
            articles: Arc::new(ArticleService::new(
                repo.clone(),
                repo.clone(),
                repo.clone(),
                repo.clone(),
                repo.clone(),
                fanout,
            )),
            notifications: Arc::new(notifications),
            challenges: Arc::new(challenges),
            events,
            db: repo,
            rate_limiter: Arc::new(RateLimiter::new(
                options.rate_window,
                options.rate_max_requests,
            )),
            keep_alive: options.keep_alive,
        }
    }
}
