use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::application::error::ServiceError;
use crate::application::repos::{UpdateProfileParams, UsersRepo};
use crate::domain::entities::{AuthorRef, UserProfile, UserRecord};
use crate::domain::users::{BIO_MAX, display_name_or, optional_text, validate_avatar_url};
use agora_api_types::ProfileUpdateRequest;

const LIST_LIMIT: u32 = 50;

/// The signed-in user's own view, which also carries their email.
#[derive(Debug, Clone, Serialize)]
pub struct AccountView {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub email: String,
}

impl From<UserRecord> for AccountView {
    fn from(record: UserRecord) -> Self {
        Self {
            profile: record.profile(),
            email: record.email,
        }
    }
}

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UsersRepo>,
}

impl UserService {
    pub fn new(users: Arc<dyn UsersRepo>) -> Self {
        Self { users }
    }

    pub async fn me(&self, user_id: Uuid) -> Result<AccountView, ServiceError> {
        let record = self
            .users
            .find_user(user_id)
            .await?
            .ok_or(ServiceError::not_found("user"))?;
        Ok(record.into())
    }

    /// Absent fields are left alone; blank `bio`/`avatar_url` clear the field and a
    /// blank display name falls back to the username.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        request: ProfileUpdateRequest,
    ) -> Result<AccountView, ServiceError> {
        let current = self
            .users
            .find_user(user_id)
            .await?
            .ok_or(ServiceError::not_found("user"))?;

        let display_name = match request.display_name.as_deref() {
            Some(raw) => display_name_or(Some(raw), &current.username)?,
            None => current.display_name.clone(),
        };
        let bio = match request.bio.as_deref() {
            Some(raw) => optional_text("bio", Some(raw), BIO_MAX)?,
            None => current.bio.clone(),
        };
        let avatar_url = match request.avatar_url.as_deref() {
            Some(raw) => validate_avatar_url(Some(raw))?,
            None => current.avatar_url.clone(),
        };

        let updated = self
            .users
            .update_profile(UpdateProfileParams {
                id: user_id,
                display_name,
                bio,
                avatar_url,
            })
            .await?;
        Ok(updated.into())
    }

    pub async fn get_user(&self, username: &str) -> Result<UserProfile, ServiceError> {
        let username = username.trim().to_lowercase();
        self.users
            .find_by_username(&username)
            .await?
            .map(|record| record.profile())
            .ok_or(ServiceError::not_found("user"))
    }

    pub async fn list_users(&self, search: Option<&str>) -> Result<Vec<UserProfile>, ServiceError> {
        let search = search.map(str::trim).filter(|value| !value.is_empty());
        let records = self.users.list_users(search, LIST_LIMIT).await?;
        Ok(records.iter().map(UserRecord::profile).collect())
    }
}

/// Resolve the author reference for content owned by `user_id`.
pub(crate) async fn author_ref(
    users: &dyn UsersRepo,
    user_id: Uuid,
) -> Result<AuthorRef, ServiceError> {
    users
        .find_user(user_id)
        .await?
        .map(|record| record.author_ref())
        .ok_or(ServiceError::not_found("user"))
}
