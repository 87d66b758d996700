use std::sync::Arc;

use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::application::auth::Principal;
use crate::application::error::ServiceError;
use crate::application::events::LiveEvent;
use crate::application::fanout::Fanout;
use crate::application::repos::{
    CommunitiesRepo, CreatePollParams, PollFilter, PollVoteOutcome, PollsRepo, UsersRepo,
};
use crate::application::users::author_ref;
use crate::domain::entities::{ClosedPoll, PollRecord, PollSummary, PollView};
use crate::domain::notifications::{EntityKind, fan_out, poll_closed_message};
use crate::domain::polls::validate_new_poll;
use crate::domain::types::{ChallengeAction, LiveEventName, NotificationKind};
use agora_api_types::PollCreateRequest;

#[derive(Clone)]
pub struct PollService {
    polls: Arc<dyn PollsRepo>,
    communities: Arc<dyn CommunitiesRepo>,
    users: Arc<dyn UsersRepo>,
    fanout: Fanout,
}

impl PollService {
    pub fn new(
        polls: Arc<dyn PollsRepo>,
        communities: Arc<dyn CommunitiesRepo>,
        users: Arc<dyn UsersRepo>,
        fanout: Fanout,
    ) -> Self {
        Self {
            polls,
            communities,
            users,
            fanout,
        }
    }

    pub async fn create(
        &self,
        author: &Principal,
        request: PollCreateRequest,
    ) -> Result<PollView, ServiceError> {
        let now = OffsetDateTime::now_utc();
        let valid = validate_new_poll(&request.question, &request.options, request.closes_at, now)?;

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
            .polls
            .create_poll(CreatePollParams {
                author_id: author.user_id,
                community_id: request.community_id,
                question: valid.question,
                options: valid.options,
                closes_at: valid.closes_at,
            })
            .await?;

        self.fanout
            .progress(author.user_id, ChallengeAction::CreatePoll)
            .await;
        self.publish(record.id, "created");
        self.view(record, Some(author.user_id), now).await
    }

    pub async fn get(&self, id: Uuid, viewer: Option<Uuid>) -> Result<PollView, ServiceError> {
        let record = self.load(id).await?;
        self.view(record, viewer, OffsetDateTime::now_utc()).await
    }

    pub async fn list(&self, filter: PollFilter) -> Result<Vec<PollSummary>, ServiceError> {
        Ok(self.polls.list_summaries(filter).await?)
    }

    /// Cast or change the voter's choice while the poll still accepts votes.
    pub async fn vote(
        &self,
        voter: &Principal,
        id: Uuid,
        option_id: Uuid,
    ) -> Result<PollView, ServiceError> {
        let record = self.load(id).await?;
        let now = OffsetDateTime::now_utc();
        if !record.accepts_votes_at(now) {
            return Err(ServiceError::conflict("poll is closed"));
        }

        let options = self.polls.option_tallies(id).await?;
        if !options.iter().any(|option| option.id == option_id) {
            return Err(ServiceError::invalid(
                "option_id",
                "option does not belong to this poll",
            ));
        }

        match self
            .polls
            .cast_vote(id, voter.user_id, option_id, now)
            .await?
        {
            PollVoteOutcome::Closed => return Err(ServiceError::conflict("poll is closed")),
            PollVoteOutcome::Cast => {
                self.fanout
                    .progress(voter.user_id, ChallengeAction::VotePoll)
                    .await;
            }
            PollVoteOutcome::Changed => {}
        }

        self.publish(id, "voted");
        self.view(record, Some(voter.user_id), now).await
    }

    /// Close a poll early; closing an already closed poll is a no-op.
    pub async fn close(&self, editor: &Principal, id: Uuid) -> Result<PollView, ServiceError> {
        let record = self.load(id).await?;
        if record.author_id != editor.user_id {
            return Err(ServiceError::forbidden(
                "only the poll author can close it",
            ));
        }

        let now = OffsetDateTime::now_utc();
        if self.polls.close_poll(id, now).await? {
            let voters = self.polls.voter_ids(id).await?;
            self.announce_closed(
                &ClosedPoll {
                    id,
                    author_id: record.author_id,
                    question: record.question.clone(),
                    voter_ids: voters,
                },
                Some(editor.user_id),
            )
            .await;
        }

        let record = self.load(id).await?;
        self.view(record, Some(editor.user_id), now).await
    }

    /// Close every open poll whose deadline has passed, then notify authors and voters.
    pub async fn close_due(&self, now: OffsetDateTime) -> Result<Vec<ClosedPoll>, ServiceError> {
        let closed = self.polls.close_due(now).await?;
        for poll in &closed {
            self.announce_closed(poll, None).await;
        }
        Ok(closed)
    }

    async fn announce_closed(&self, poll: &ClosedPoll, actor: Option<Uuid>) {
        metrics::counter!("agora_polls_closed_total").increment(1);
        info!(
            target = "agora::polls",
            poll_id = %poll.id,
            voters = poll.voter_ids.len(),
            "poll closed"
        );

        let candidates = std::iter::once(poll.author_id).chain(poll.voter_ids.iter().copied());
        self.fanout
            .notify(fan_out(
                candidates,
                actor,
                NotificationKind::PollClosed,
                EntityKind::Poll,
                poll.id,
                &poll_closed_message(&poll.question),
            ))
            .await;
        self.publish(poll.id, "closed");
    }

    async fn load(&self, id: Uuid) -> Result<PollRecord, ServiceError> {
        self.polls
            .find_poll(id)
            .await?
            .ok_or(ServiceError::not_found("poll"))
    }

    async fn view(
        &self,
        record: PollRecord,
        viewer: Option<Uuid>,
        now: OffsetDateTime,
    ) -> Result<PollView, ServiceError> {
        let author = author_ref(self.users.as_ref(), record.author_id).await?;
        let options = self.polls.option_tallies(record.id).await?;
        let total_votes = options.iter().map(|option| option.votes).sum();
        let viewer_choice = match viewer {
            Some(user_id) => self.polls.choice_of(record.id, user_id).await?,
            None => None,
        };

        Ok(PollView {
            id: record.id,
            author,
            community_id: record.community_id,
            accepting_votes: record.accepts_votes_at(now),
            question: record.question,
            status: record.status,
            options,
            total_votes,
            viewer_choice,
            closes_at: record.closes_at,
            closed_at: record.closed_at,
            created_at: record.created_at,
        })
    }

    fn publish(&self, id: Uuid, action: &str) {
        self.fanout
            .publish(LiveEvent::broadcast(LiveEventName::PollUpdate, id, action));
    }
}
