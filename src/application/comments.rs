use std::sync::Arc;

use uuid::Uuid;

use crate::application::auth::Principal;
use crate::application::error::ServiceError;
use crate::application::events::LiveEvent;
use crate::application::fanout::Fanout;
use crate::application::repos::{
    AnswersRepo, ArticlesRepo, CommentsRepo, QuestionsRepo, UsersRepo,
};
use crate::application::users::author_ref;
use crate::domain::content::clean_comment_body;
use crate::domain::entities::CommentView;
use crate::domain::notifications::{EntityKind, comment_message, fan_out};
use crate::domain::types::{ChallengeAction, ContentKind, LiveEventName, NotificationKind};

#[derive(Clone)]
pub struct CommentService {
    comments: Arc<dyn CommentsRepo>,
    questions: Arc<dyn QuestionsRepo>,
    answers: Arc<dyn AnswersRepo>,
    articles: Arc<dyn ArticlesRepo>,
    users: Arc<dyn UsersRepo>,
    fanout: Fanout,
}

impl CommentService {
    pub fn new(
        comments: Arc<dyn CommentsRepo>,
        questions: Arc<dyn QuestionsRepo>,
        answers: Arc<dyn AnswersRepo>,
        articles: Arc<dyn ArticlesRepo>,
        users: Arc<dyn UsersRepo>,
        fanout: Fanout,
    ) -> Self {
        Self {
            comments,
            questions,
            answers,
            articles,
            users,
            fanout,
        }
    }

    pub async fn add(
        &self,
        author: &Principal,
        target_kind: ContentKind,
        target_id: Uuid,
        body: &str,
    ) -> Result<CommentView, ServiceError> {
        let body = clean_comment_body(body)?;
        let target_author = self.target_author(target_kind, target_id).await?;

        let record = self
            .comments
            .create_comment(target_kind, target_id, author.user_id, body)
            .await?;

        self.fanout
            .notify(fan_out(
                [target_author],
                Some(author.user_id),
                NotificationKind::Comment,
                EntityKind::from(target_kind),
                target_id,
                &comment_message(&author.display_name, target_kind),
            ))
            .await;
        self.fanout
            .progress(author.user_id, ChallengeAction::PostComment)
            .await;
        self.fanout.publish(
            LiveEvent::broadcast(LiveEventName::CommentUpdate, record.id, "created")
                .with("target_kind", target_kind.as_str())
                .with("target_id", target_id.to_string()),
        );

        Ok(CommentView {
            id: record.id,
            target_kind: record.target_kind,
            target_id: record.target_id,
            author: author_ref(self.users.as_ref(), record.author_id).await?,
            body: record.body,
            score: 0,
            created_at: record.created_at,
        })
    }

    pub async fn list(
        &self,
        target_kind: ContentKind,
        target_id: Uuid,
    ) -> Result<Vec<CommentView>, ServiceError> {
        self.target_author(target_kind, target_id).await?;
        Ok(self.comments.list_for_target(target_kind, target_id).await?)
    }

    pub async fn delete(&self, editor: &Principal, id: Uuid) -> Result<(), ServiceError> {
        let comment = self
            .comments
            .find_comment(id)
            .await?
            .ok_or(ServiceError::not_found("comment"))?;
        if comment.author_id != editor.user_id {
            return Err(ServiceError::forbidden(
                "only the author can delete this comment",
            ));
        }

        self.comments.delete_comment(id).await?;
        self.fanout.publish(
            LiveEvent::broadcast(LiveEventName::CommentUpdate, id, "deleted")
                .with("target_kind", comment.target_kind.as_str())
                .with("target_id", comment.target_id.to_string()),
        );
        Ok(())
    }

    async fn target_author(&self, kind: ContentKind, id: Uuid) -> Result<Uuid, ServiceError> {
        if !kind.accepts_comments() {
            return Err(ServiceError::invalid(
                "target_kind",
                format!("{kind} does not accept comments"),
            ));
        }
        let author = match kind {
            ContentKind::Question => self
                .questions
                .find_question(id)
                .await?
                .map(|record| record.author_id),
            ContentKind::Answer => self
                .answers
                .find_answer(id)
                .await?
                .map(|record| record.author_id),
            ContentKind::Article => self
                .articles
                .find_article(id)
                .await?
                .map(|record| record.author_id),
            ContentKind::Comment => None,
        };
        author.ok_or(ServiceError::not_found(kind.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{Harness, principal};

    #[tokio::test]
    async fn comments_notify_the_target_author() {
        let harness = Harness::new();
        let writer = harness.users.insert("ada");
        let reader = harness.users.insert("grace");
        let article = harness.content.article(writer.id);

        let view = harness
            .comments()
            .add(&principal(&reader), ContentKind::Article, article, "Nice read")
            .await
            .expect("commented");

        assert_eq!(view.body, "Nice read");
        assert_eq!(harness.notifications.count_for(writer.id), 1);
    }

    #[tokio::test]
    async fn comments_are_limited_to_six_hundred_characters() {
        let harness = Harness::new();
        let writer = harness.users.insert("ada");
        let question = harness.content.question(writer.id, "Long comments?");

        let err = harness
            .comments()
            .add(
                &principal(&writer),
                ContentKind::Question,
                question,
                &"x".repeat(601),
            )
            .await
            .expect_err("too long");
        assert!(matches!(err, ServiceError::Domain(_)));
    }

    #[tokio::test]
    async fn comments_cannot_nest() {
        let harness = Harness::new();
        let writer = harness.users.insert("ada");

        let err = harness
            .comments()
            .add(&principal(&writer), ContentKind::Comment, Uuid::new_v4(), "hi")
            .await
            .expect_err("nested");
        assert!(matches!(err, ServiceError::Domain(_)));
    }

    #[tokio::test]
    async fn missing_targets_are_not_found() {
        let harness = Harness::new();
        let writer = harness.users.insert("ada");

        let err = harness
            .comments()
            .add(&principal(&writer), ContentKind::Answer, Uuid::new_v4(), "hi")
            .await
            .expect_err("missing");
        assert!(matches!(err, ServiceError::NotFound { entity: "answer" }));
    }
}
