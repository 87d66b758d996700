use std::sync::Arc;

use uuid::Uuid;

use crate::application::auth::Principal;
use crate::application::error::ServiceError;
use crate::application::events::LiveEvent;
use crate::application::fanout::Fanout;
use crate::application::repos::{CommunitiesRepo, CreateCommunityParams, UsersRepo};
use crate::application::users::author_ref;
use crate::domain::content::clean_text;
use crate::domain::entities::{
    CommunityDetail, CommunityMember, CommunityRecord, CommunitySummary,
};
use crate::domain::notifications::{EntityKind, community_join_message, fan_out};
use crate::domain::slug::{SlugAsyncError, SlugError, generate_unique_slug_async};
use crate::domain::types::{LiveEventName, NotificationKind};
use agora_api_types::CommunityCreateRequest;

pub const NAME_MIN: usize = 3;
pub const NAME_MAX: usize = 64;
pub const DESCRIPTION_MAX: usize = 500;

#[derive(Clone)]
pub struct CommunityService {
    communities: Arc<dyn CommunitiesRepo>,
    users: Arc<dyn UsersRepo>,
    fanout: Fanout,
}

impl CommunityService {
    pub fn new(
        communities: Arc<dyn CommunitiesRepo>,
        users: Arc<dyn UsersRepo>,
        fanout: Fanout,
    ) -> Self {
        Self {
            communities,
            users,
            fanout,
        }
    }

    pub async fn create(
        &self,
        owner: &Principal,
        request: CommunityCreateRequest,
    ) -> Result<CommunityDetail, ServiceError> {
        let name = clean_text("name", &request.name, NAME_MIN, NAME_MAX)?;
        let description = clean_text("description", &request.description, 0, DESCRIPTION_MAX)?;

        let repo = self.communities.clone();
        let slug = generate_unique_slug_async(&name, |candidate| {
            let repo = repo.clone();
            let candidate = candidate.to_string();
            async move { repo.slug_exists(&candidate).await.map(|exists| !exists) }
        })
        .await
        .map_err(|err| match err {
            SlugAsyncError::Predicate(repo) => ServiceError::Repo(repo),
            SlugAsyncError::Slug(SlugError::Exhausted { .. }) => {
                ServiceError::conflict("no free slug left for this community name")
            }
            SlugAsyncError::Slug(_) => {
                ServiceError::invalid("name", "must contain letters or digits")
            }
        })?;

        let record = self
            .communities
            .create_community(CreateCommunityParams {
                slug,
                name,
                description,
                owner_id: owner.user_id,
            })
            .await?;

        self.publish(&record, "created");
        self.detail(record, Some(owner.user_id)).await
    }

    pub async fn list(&self, search: Option<&str>) -> Result<Vec<CommunitySummary>, ServiceError> {
        let search = search.map(str::trim).filter(|value| !value.is_empty());
        Ok(self.communities.list_summaries(search).await?)
    }

    pub async fn get(
        &self,
        slug: &str,
        viewer: Option<Uuid>,
    ) -> Result<CommunityDetail, ServiceError> {
        let record = self.load(slug).await?;
        self.detail(record, viewer).await
    }

    pub async fn members(&self, slug: &str) -> Result<Vec<CommunityMember>, ServiceError> {
        let record = self.load(slug).await?;
        Ok(self.communities.members(record.id).await?)
    }

    pub async fn join(
        &self,
        member: &Principal,
        slug: &str,
    ) -> Result<CommunityDetail, ServiceError> {
        let record = self.load(slug).await?;
        let inserted = self.communities.add_member(record.id, member.user_id).await?;

        if inserted {
            self.fanout
                .notify(fan_out(
                    [record.owner_id],
                    Some(member.user_id),
                    NotificationKind::CommunityJoin,
                    EntityKind::Community,
                    record.id,
                    &community_join_message(&member.display_name, &record.name),
                ))
                .await;
            self.publish(&record, "joined");
        }
        self.detail(record, Some(member.user_id)).await
    }

    pub async fn leave(
        &self,
        member: &Principal,
        slug: &str,
    ) -> Result<CommunityDetail, ServiceError> {
        let record = self.load(slug).await?;
        if record.owner_id == member.user_id {
            return Err(ServiceError::conflict(
                "the owner cannot leave their community",
            ));
        }
        if self
            .communities
            .remove_member(record.id, member.user_id)
            .await?
        {
            self.publish(&record, "left");
        }
        self.detail(record, Some(member.user_id)).await
    }

    async fn load(&self, slug: &str) -> Result<CommunityRecord, ServiceError> {
        self.communities
            .find_by_slug(slug)
            .await?
            .ok_or(ServiceError::not_found("community"))
    }

    async fn detail(
        &self,
        community: CommunityRecord,
        viewer: Option<Uuid>,
    ) -> Result<CommunityDetail, ServiceError> {
        let owner = author_ref(self.users.as_ref(), community.owner_id).await?;
        let counts = self.communities.counts(community.id).await?;
        let viewer_is_member = match viewer {
            Some(user_id) => self.communities.is_member(community.id, user_id).await?,
            None => false,
        };
        Ok(CommunityDetail {
            community,
            owner,
            counts,
            viewer_is_member,
        })
    }

    fn publish(&self, record: &CommunityRecord, action: &str) {
        self.fanout.publish(
            LiveEvent::broadcast(LiveEventName::CommunityUpdate, record.id, action)
                .with("slug", record.slug.clone()),
        );
    }
}
