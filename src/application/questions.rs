use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::application::auth::Principal;
use crate::application::error::ServiceError;
use crate::application::events::LiveEvent;
use crate::application::fanout::Fanout;
use crate::application::pagination::{CursorPage, OffsetCursor, PageRequest};
use crate::application::repos::{
    AcceptedAnswerSwap, AnswersRepo, CommentsRepo, CommunitiesRepo, CreateQuestionParams,
    QuestionFilter, QuestionsRepo, UpdateQuestionParams, UsersRepo, VotesRepo,
};
use crate::application::users::author_ref;
use crate::domain::content::{BODY_MAX, clean_body, clean_question_title};
use crate::domain::entities::{QuestionDetail, QuestionRecord, QuestionSummary};
use crate::domain::notifications::{
    EntityKind, accepted_message, community_question_message, fan_out,
};
use crate::domain::questions::{ACCEPTED_ANSWER_REPUTATION, apply_order, normalize_tags};
use crate::domain::types::{
    ChallengeAction, ContentKind, LiveEventName, NotificationKind, QuestionOrder,
};
use agora_api_types::{QuestionCreateRequest, QuestionUpdateRequest};

#[derive(Debug, Clone, Default)]
pub struct QuestionQuery {
    pub order: QuestionOrder,
    pub filter: QuestionFilter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AcceptOutcome {
    pub question_id: Uuid,
    pub accepted_answer_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct QuestionService {
    questions: Arc<dyn QuestionsRepo>,
    answers: Arc<dyn AnswersRepo>,
    comments: Arc<dyn CommentsRepo>,
    votes: Arc<dyn VotesRepo>,
    users: Arc<dyn UsersRepo>,
    communities: Arc<dyn CommunitiesRepo>,
    fanout: Fanout,
}

impl QuestionService {
    pub fn new(
        questions: Arc<dyn QuestionsRepo>,
        answers: Arc<dyn AnswersRepo>,
        comments: Arc<dyn CommentsRepo>,
        votes: Arc<dyn VotesRepo>,
        users: Arc<dyn UsersRepo>,
        communities: Arc<dyn CommunitiesRepo>,
        fanout: Fanout,
    ) -> Self {
        Self {
            questions,
            answers,
            comments,
            votes,
            users,
            communities,
            fanout,
        }
    }

    pub async fn ask(
        &self,
        author: &Principal,
        request: QuestionCreateRequest,
    ) -> Result<QuestionDetail, ServiceError> {
        let title = clean_question_title(&request.title)?;
        let body = clean_body("body", &request.body, BODY_MAX)?;
        let tags = normalize_tags(&request.tags)?;

        let community = match request.community_id {
            Some(id) => {
                let community = self
                    .communities
                    .find_community(id)
                    .await?
                    .ok_or(ServiceError::not_found("community"))?;
                if !self.communities.is_member(id, author.user_id).await? {
                    return Err(ServiceError::forbidden(
                        "only members can post in this community",
                    ));
                }
                Some(community)
            }
            None => None,
        };

        let record = self
            .questions
            .create_question(CreateQuestionParams {
                author_id: author.user_id,
                community_id: request.community_id,
                title,
                body,
                tags,
            })
            .await?;

        if let Some(community) = community {
            let members = self.communities.member_ids(community.id).await?;
            let message =
                community_question_message(&author.display_name, &community.name, &record.title);
            self.fanout
                .notify(fan_out(
                    members,
                    Some(author.user_id),
                    NotificationKind::CommunityQuestion,
                    EntityKind::Question,
                    record.id,
                    &message,
                ))
                .await;
        }
        self.fanout
            .progress(author.user_id, ChallengeAction::AskQuestion)
            .await;
        self.fanout.publish(
            LiveEvent::broadcast(LiveEventName::QuestionUpdate, record.id, "created")
                .with("title", record.title.clone()),
        );

        self.detail(record, Some(author.user_id)).await
    }

    /// Load a question; authenticated viewers are counted once each.
    pub async fn get(&self, id: Uuid, viewer: Option<Uuid>) -> Result<QuestionDetail, ServiceError> {
        let mut record = self.load(id).await?;
        if let Some(viewer_id) = viewer
            && self.questions.record_view(id, viewer_id).await?
        {
            record.views += 1;
        }
        self.detail(record, viewer).await
    }

    pub async fn list(
        &self,
        query: QuestionQuery,
        page: PageRequest<OffsetCursor>,
    ) -> Result<CursorPage<QuestionSummary>, ServiceError> {
        let mut filter = query.filter;
        filter.search = filter
            .search
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        filter.tag = filter.tag.map(|value| value.trim().to_lowercase());

        let mut items = self.questions.list_summaries(&filter).await?;
        apply_order(&mut items, query.order);
        Ok(CursorPage::from_sorted(items, page))
    }

    pub async fn edit(
        &self,
        editor: &Principal,
        id: Uuid,
        request: QuestionUpdateRequest,
    ) -> Result<QuestionDetail, ServiceError> {
        let current = self.load(id).await?;
        ensure_author(&current, editor)?;

        let title = match request.title.as_deref() {
            Some(raw) => clean_question_title(raw)?,
            None => current.title.clone(),
        };
        let body = match request.body.as_deref() {
            Some(raw) => clean_body("body", raw, BODY_MAX)?,
            None => current.body.clone(),
        };
        let tags = request
            .tags
            .as_deref()
            .map(normalize_tags)
            .transpose()?;

        let updated = self
            .questions
            .update_question(UpdateQuestionParams {
                id,
                title,
                body,
                tags,
            })
            .await?;

        self.fanout.publish(LiveEvent::broadcast(
            LiveEventName::QuestionUpdate,
            id,
            "updated",
        ));
        self.detail(updated, Some(editor.user_id)).await
    }

    pub async fn delete(&self, editor: &Principal, id: Uuid) -> Result<(), ServiceError> {
        let current = self.load(id).await?;
        ensure_author(&current, editor)?;
        self.questions.delete_question(id).await?;
        self.fanout.publish(LiveEvent::broadcast(
            LiveEventName::QuestionUpdate,
            id,
            "deleted",
        ));
        Ok(())
    }

    /// Accept an answer, or un-accept it when it is already the accepted one.
    pub async fn accept_answer(
        &self,
        editor: &Principal,
        question_id: Uuid,
        answer_id: Uuid,
    ) -> Result<AcceptOutcome, ServiceError> {
        let question = self.load(question_id).await?;
        if question.author_id != editor.user_id {
            return Err(ServiceError::forbidden(
                "only the question author can accept answers",
            ));
        }
        let answer = self
            .answers
            .find_answer(answer_id)
            .await?
            .ok_or(ServiceError::not_found("answer"))?;
        if answer.question_id != question_id {
            return Err(ServiceError::invalid(
                "answer_id",
                "answer does not belong to this question",
            ));
        }

        let previous = question.accepted_answer_id;
        let next = if previous == Some(answer_id) {
            None
        } else {
            Some(answer_id)
        };

        let previous_author = match previous {
            Some(previous_id) => self
                .answers
                .find_answer(previous_id)
                .await?
                .map(|previous_answer| previous_answer.author_id),
            None => None,
        };

        let swapped = self
            .questions
            .swap_accepted_answer(AcceptedAnswerSwap {
                question_id,
                expected: previous,
                accepted: next,
                previous_author,
                next_author: next.map(|_| answer.author_id),
                points: ACCEPTED_ANSWER_REPUTATION,
            })
            .await?;
        if !swapped {
            return Err(ServiceError::conflict(
                "the accepted answer changed concurrently; retry",
            ));
        }

        if next.is_some() {
            self.fanout
                .notify(fan_out(
                    [answer.author_id],
                    Some(editor.user_id),
                    NotificationKind::AcceptedAnswer,
                    EntityKind::Answer,
                    answer.id,
                    &accepted_message(&editor.display_name, &question.title),
                ))
                .await;
        }

        self.fanout.publish(
            LiveEvent::broadcast(LiveEventName::QuestionUpdate, question_id, "accepted")
                .with("accepted_answer_id", next.map(|id| id.to_string())),
        );

        Ok(AcceptOutcome {
            question_id,
            accepted_answer_id: next,
        })
    }

    async fn load(&self, id: Uuid) -> Result<QuestionRecord, ServiceError> {
        self.questions
            .find_question(id)
            .await?
            .ok_or(ServiceError::not_found("question"))
    }

    async fn detail(
        &self,
        record: QuestionRecord,
        viewer: Option<Uuid>,
    ) -> Result<QuestionDetail, ServiceError> {
        let author = author_ref(self.users.as_ref(), record.author_id).await?;
        let tags = self.questions.question_tags(record.id).await?;
        let score = self.votes.score(ContentKind::Question, record.id).await?;
        let viewer_vote = match viewer {
            Some(viewer_id) => {
                self.votes
                    .vote_of(ContentKind::Question, record.id, viewer_id)
                    .await?
            }
            None => None,
        };
        let answers = self.answers.list_for_question(record.id, viewer).await?;
        let comments = self
            .comments
            .list_for_target(ContentKind::Question, record.id)
            .await?;

        Ok(QuestionDetail {
            id: record.id,
            title: record.title,
            body: record.body,
            author,
            community_id: record.community_id,
            tags,
            views: record.views,
            score,
            viewer_vote,
            accepted_answer_id: record.accepted_answer_id,
            answers,
            comments,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

fn ensure_author(record: &QuestionRecord, editor: &Principal) -> Result<(), ServiceError> {
    if record.author_id != editor.user_id {
        return Err(ServiceError::forbidden(
            "only the author can change this question",
        ));
    }
    Ok(())
}
