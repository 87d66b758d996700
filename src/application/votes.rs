use std::sync::Arc;

use uuid::Uuid;

use crate::application::auth::Principal;
use crate::application::error::ServiceError;
use crate::application::events::LiveEvent;
use crate::application::fanout::Fanout;
use crate::application::repos::{
    AnswersRepo, ArticlesRepo, CommentsRepo, QuestionsRepo, VotesRepo,
};
use crate::domain::entities::VoteTally;
use crate::domain::notifications::{EntityKind, NotificationDraft, upvote_message};
use crate::domain::types::{
    ChallengeAction, ContentKind, LiveEventName, NotificationKind, VoteDirection,
};

/// Live event carrying updates for a content kind.
pub(crate) fn event_for(kind: ContentKind) -> LiveEventName {
    match kind {
        ContentKind::Question => LiveEventName::QuestionUpdate,
        ContentKind::Answer => LiveEventName::AnswerUpdate,
        ContentKind::Comment => LiveEventName::CommentUpdate,
        ContentKind::Article => LiveEventName::ArticleUpdate,
    }
}

#[derive(Clone)]
pub struct VoteService {
    questions: Arc<dyn QuestionsRepo>,
    answers: Arc<dyn AnswersRepo>,
    comments: Arc<dyn CommentsRepo>,
    articles: Arc<dyn ArticlesRepo>,
    votes: Arc<dyn VotesRepo>,
    fanout: Fanout,
}

impl VoteService {
    pub fn new(
        questions: Arc<dyn QuestionsRepo>,
        answers: Arc<dyn AnswersRepo>,
        comments: Arc<dyn CommentsRepo>,
        articles: Arc<dyn ArticlesRepo>,
        votes: Arc<dyn VotesRepo>,
        fanout: Fanout,
    ) -> Self {
        Self {
            questions,
            answers,
            comments,
            articles,
            votes,
            fanout,
        }
    }

    /// Toggle the voter's vote on a target: same direction retracts, the
    /// opposite direction flips. The author is notified of a voter's first
    /// up-vote and `cast_vote` advances on a voter's first vote per target.
    pub async fn vote(
        &self,
        voter: &Principal,
        kind: ContentKind,
        target_id: Uuid,
        direction: VoteDirection,
    ) -> Result<VoteTally, ServiceError> {
        let owner_id = self.owner_of(kind, target_id).await?;
        if owner_id == voter.user_id {
            return Err(ServiceError::invalid(
                "direction",
                "you cannot vote on your own content",
            ));
        }

        let outcome = self
            .votes
            .toggle_vote(kind, target_id, voter.user_id, direction)
            .await?;
        let score = self.votes.score(kind, target_id).await?;

        if outcome.first_upvote {
            self.fanout
                .notify(vec![NotificationDraft {
                    recipient_id: owner_id,
                    actor_id: Some(voter.user_id),
                    kind: NotificationKind::Upvote,
                    entity_kind: EntityKind::from(kind),
                    entity_id: target_id,
                    message: upvote_message(&voter.display_name, kind),
                }])
                .await;
        }
        if outcome.first_vote {
            self.fanout
                .progress(voter.user_id, ChallengeAction::CastVote)
                .await;
        }

        self.fanout.publish(
            LiveEvent::broadcast(event_for(kind), target_id, "voted").with("score", score),
        );

        Ok(VoteTally {
            target_kind: kind,
            target_id,
            score,
            viewer_vote: outcome.change.resulting(),
        })
    }

    async fn owner_of(&self, kind: ContentKind, id: Uuid) -> Result<Uuid, ServiceError> {
        let owner = match kind {
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
            ContentKind::Comment => self
                .comments
                .find_comment(id)
                .await?
                .map(|record| record.author_id),
            ContentKind::Article => self
                .articles
                .find_article(id)
                .await?
                .map(|record| record.author_id),
        };
        owner.ok_or(ServiceError::not_found(kind.as_str()))
    }
}
