use std::sync::Arc;

use uuid::Uuid;

use crate::application::auth::Principal;
use crate::application::error::ServiceError;
use crate::application::events::LiveEvent;
use crate::application::fanout::Fanout;
use crate::application::repos::{AnswersRepo, QuestionsRepo, UsersRepo};
use crate::application::users::author_ref;
use crate::domain::content::{BODY_MAX, clean_body};
use crate::domain::entities::AnswerView;
use crate::domain::notifications::{EntityKind, answer_message, fan_out};
use crate::domain::types::{ChallengeAction, LiveEventName, NotificationKind};
use agora_api_types::AnswerCreateRequest;

#[derive(Clone)]
pub struct AnswerService {
    answers: Arc<dyn AnswersRepo>,
    questions: Arc<dyn QuestionsRepo>,
    users: Arc<dyn UsersRepo>,
    fanout: Fanout,
}

impl AnswerService {
    pub fn new(
        answers: Arc<dyn AnswersRepo>,
        questions: Arc<dyn QuestionsRepo>,
        users: Arc<dyn UsersRepo>,
        fanout: Fanout,
    ) -> Self {
        Self {
            answers,
            questions,
            users,
            fanout,
        }
    }

    pub async fn post(
        &self,
        author: &Principal,
        request: AnswerCreateRequest,
    ) -> Result<AnswerView, ServiceError> {
        let body = clean_body("body", &request.body, BODY_MAX)?;
        let question = self
            .questions
            .find_question(request.question_id)
            .await?
            .ok_or(ServiceError::not_found("question"))?;

        let record = self
            .answers
            .create_answer(question.id, author.user_id, body)
            .await?;

        self.fanout
            .notify(fan_out(
                [question.author_id],
                Some(author.user_id),
                NotificationKind::Answer,
                EntityKind::Answer,
                record.id,
                &answer_message(&author.display_name, &question.title),
            ))
            .await;
        self.fanout
            .progress(author.user_id, ChallengeAction::PostAnswer)
            .await;
        self.fanout.publish(
            LiveEvent::broadcast(LiveEventName::AnswerUpdate, record.id, "created")
                .with("question_id", question.id.to_string()),
        );
        self.fanout.publish(LiveEvent::broadcast(
            LiveEventName::QuestionUpdate,
            question.id,
            "answered",
        ));

        Ok(AnswerView {
            id: record.id,
            question_id: record.question_id,
            author: author_ref(self.users.as_ref(), record.author_id).await?,
            body: record.body,
            score: 0,
            accepted: false,
            viewer_vote: None,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    pub async fn list(
        &self,
        question_id: Uuid,
        viewer: Option<Uuid>,
    ) -> Result<Vec<AnswerView>, ServiceError> {
        if self.questions.find_question(question_id).await?.is_none() {
            return Err(ServiceError::not_found("question"));
        }
        Ok(self.answers.list_for_question(question_id, viewer).await?)
    }

    pub async fn delete(&self, editor: &Principal, id: Uuid) -> Result<(), ServiceError> {
        let answer = self
            .answers
            .find_answer(id)
            .await?
            .ok_or(ServiceError::not_found("answer"))?;
        if answer.author_id != editor.user_id {
            return Err(ServiceError::forbidden(
                "only the author can delete this answer",
            ));
        }

        self.answers.delete_answer(id).await?;
        self.fanout.publish(
            LiveEvent::broadcast(LiveEventName::AnswerUpdate, id, "deleted")
                .with("question_id", answer.question_id.to_string()),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{Harness, principal};

    #[tokio::test]
    async fn posting_notifies_the_question_author_only() {
        let harness = Harness::new();
        let asker = harness.users.insert("ada");
        let helper = harness.users.insert("grace");
        let question = harness.content.question(asker.id, "Why is the sky blue?");

        let view = harness
            .answers()
            .post(
                &principal(&helper),
                AnswerCreateRequest {
                    question_id: question,
                    body: "Rayleigh scattering.".into(),
                },
            )
            .await
            .expect("posted");

        assert_eq!(view.author.username, "grace");
        assert_eq!(harness.notifications.count_for(asker.id), 1);
        assert_eq!(harness.notifications.count_for(helper.id), 0);
    }

    #[tokio::test]
    async fn answering_your_own_question_is_silent() {
        let harness = Harness::new();
        let asker = harness.users.insert("ada");
        let question = harness.content.question(asker.id, "Rubber duck question");

        harness
            .answers()
            .post(
                &principal(&asker),
                AnswerCreateRequest {
                    question_id: question,
                    body: "Figured it out.".into(),
                },
            )
            .await
            .expect("posted");

        assert_eq!(harness.notifications.count_for(asker.id), 0);
    }

    #[tokio::test]
    async fn empty_bodies_are_rejected() {
        let harness = Harness::new();
        let asker = harness.users.insert("ada");
        let question = harness.content.question(asker.id, "Anything?");

        let err = harness
            .answers()
            .post(
                &principal(&asker),
                AnswerCreateRequest {
                    question_id: question,
                    body: "<script></script>   ".into(),
                },
            )
            .await
            .expect_err("empty");
        assert!(matches!(err, ServiceError::Domain(_)));
    }

    #[tokio::test]
    async fn only_the_author_may_delete() {
        let harness = Harness::new();
        let asker = harness.users.insert("ada");
        let helper = harness.users.insert("grace");
        let question = harness.content.question(asker.id, "Delete me?");
        let answer = harness.content.answer(question, helper.id);

        let err = harness
            .answers()
            .delete(&principal(&asker), answer)
            .await
            .expect_err("forbidden");
        assert!(matches!(err, ServiceError::Forbidden { .. }));

        harness
            .answers()
            .delete(&principal(&helper), answer)
            .await
            .expect("deleted");
    }
}
