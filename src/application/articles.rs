use std::sync::Arc;

use uuid::Uuid;

use crate::application::auth::Principal;
use crate::application::error::ServiceError;
use crate::application::events::LiveEvent;
use crate::application::fanout::Fanout;
use crate::application::repos::{
    ArticleFilter, ArticlesRepo, CommentsRepo, CommunitiesRepo, CreateArticleParams,
    UpdateArticleParams, UsersRepo, VotesRepo,
};
use crate::application::users::author_ref;
use crate::domain::content::{ARTICLE_TITLE_MAX, BODY_MAX, clean_body, clean_text};
use crate::domain::entities::{ArticleRecord, ArticleSummary, ArticleView};
use crate::domain::error::DomainError;
use crate::domain::types::{ChallengeAction, ContentKind, LiveEventName};
use agora_api_types::{ArticleCreateRequest, ArticleUpdateRequest};

const TITLE_MIN: usize = 3;

#[derive(Clone)]
pub struct ArticleService {
    articles: Arc<dyn ArticlesRepo>,
    comments: Arc<dyn CommentsRepo>,
    votes: Arc<dyn VotesRepo>,
    communities: Arc<dyn CommunitiesRepo>,
    users: Arc<dyn UsersRepo>,
    fanout: Fanout,
}

impl ArticleService {
    pub fn new(
        articles: Arc<dyn ArticlesRepo>,
        comments: Arc<dyn CommentsRepo>,
        votes: Arc<dyn VotesRepo>,
        communities: Arc<dyn CommunitiesRepo>,
        users: Arc<dyn UsersRepo>,
        fanout: Fanout,
    ) -> Self {
        Self {
            articles,
            comments,
            votes,
            communities,
            users,
            fanout,
        }
    }

    pub async fn create(
        &self,
        author: &Principal,
        request: ArticleCreateRequest,
    ) -> Result<ArticleView, ServiceError> {
        let title = clean_title(&request.title)?;
        let body = clean_body("body", &request.body, BODY_MAX)?;

        if let Some(community_id) = request.community_id {
            if self.communities.find_community(community_id).await?.is_none() {
                return Err(ServiceError::not_found("community"));
            }
            if !self
                .communities
                .is_member(community_id, author.user_id)
                .await?
            {
                return Err(ServiceError::forbidden(
                    "only members can post in this community",
                ));
            }
        }

        let record = self
            .articles
            .create_article(CreateArticleParams {
                author_id: author.user_id,
                community_id: request.community_id,
                title,
                body,
            })
            .await?;

        self.fanout
            .progress(author.user_id, ChallengeAction::PublishArticle)
            .await;
        self.fanout.publish(
            LiveEvent::broadcast(LiveEventName::ArticleUpdate, record.id, "created")
                .with("title", record.title.clone()),
        );
        self.view(record, Some(author.user_id)).await
    }

    pub async fn get(&self, id: Uuid, viewer: Option<Uuid>) -> Result<ArticleView, ServiceError> {
        let record = self.load(id).await?;
        self.view(record, viewer).await
    }

    pub async fn list(&self, filter: ArticleFilter) -> Result<Vec<ArticleSummary>, ServiceError> {
        let filter = ArticleFilter {
            search: filter
                .search
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
            ..filter
        };
        Ok(self.articles.list_summaries(&filter).await?)
    }

    pub async fn edit(
        &self,
        editor: &Principal,
        id: Uuid,
        request: ArticleUpdateRequest,
    ) -> Result<ArticleView, ServiceError> {
        let current = self.load(id).await?;
        ensure_author(&current, editor)?;

        let title = match request.title.as_deref() {
            Some(raw) => clean_title(raw)?,
            None => current.title.clone(),
        };
        let body = match request.body.as_deref() {
            Some(raw) => clean_body("body", raw, BODY_MAX)?,
            None => current.body.clone(),
        };

        let updated = self
            .articles
            .update_article(UpdateArticleParams { id, title, body })
            .await?;
        self.fanout.publish(LiveEvent::broadcast(
            LiveEventName::ArticleUpdate,
            id,
            "updated",
        ));
        self.view(updated, Some(editor.user_id)).await
    }

    pub async fn delete(&self, editor: &Principal, id: Uuid) -> Result<(), ServiceError> {
        let current = self.load(id).await?;
        ensure_author(&current, editor)?;
        self.articles.delete_article(id).await?;
        self.fanout.publish(LiveEvent::broadcast(
            LiveEventName::ArticleUpdate,
            id,
            "deleted",
        ));
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<ArticleRecord, ServiceError> {
        self.articles
            .find_article(id)
            .await?
            .ok_or(ServiceError::not_found("article"))
    }

    async fn view(
        &self,
        record: ArticleRecord,
        viewer: Option<Uuid>,
    ) -> Result<ArticleView, ServiceError> {
        let author = author_ref(self.users.as_ref(), record.author_id).await?;
        let score = self.votes.score(ContentKind::Article, record.id).await?;
        let viewer_vote = match viewer {
            Some(user_id) => {
                self.votes
                    .vote_of(ContentKind::Article, record.id, user_id)
                    .await?
            }
            None => None,
        };
        let comments = self
            .comments
            .list_for_target(ContentKind::Article, record.id)
            .await?;

        Ok(ArticleView {
            id: record.id,
            title: record.title,
            body: record.body,
            author,
            community_id: record.community_id,
            score,
            viewer_vote,
            comments,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

fn clean_title(raw: &str) -> Result<String, DomainError> {
    clean_text("title", raw, TITLE_MIN, ARTICLE_TITLE_MAX)
}

fn ensure_author(record: &ArticleRecord, editor: &Principal) -> Result<(), ServiceError> {
    if record.author_id != editor.user_id {
        return Err(ServiceError::forbidden(
            "only the author can change this article",
        ));
    }
    Ok(())
}
