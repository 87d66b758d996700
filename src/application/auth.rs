use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::application::error::ServiceError;
use crate::application::repos::{
    CreateSessionParams, CreateUserParams, RepoError, SessionsRepo, UsersRepo,
};
use crate::domain::entities::{UserProfile, UserRecord};
use crate::domain::sessions::{SessionState, mint_token, parse_token};
use crate::domain::users::{
    display_name_or, hash_password, normalize_email, normalize_username, validate_password,
    verify_password,
};
use agora_api_types::{LoginRequest, RegisterRequest};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing session token")]
    Missing,
    #[error("invalid session token")]
    Invalid,
    #[error("expired session token")]
    Expired,
    #[error("revoked session token")]
    Revoked,
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// The authenticated user behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub session_id: Uuid,
}

/// Returned by register and login.
#[derive(Debug, Clone, Serialize)]
pub struct SessionIssued {
    pub user: UserProfile,
    pub token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UsersRepo>,
    sessions: Arc<dyn SessionsRepo>,
    session_ttl: Duration,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        sessions: Arc<dyn SessionsRepo>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            users,
            sessions,
            session_ttl,
        }
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<SessionIssued, ServiceError> {
        let username = normalize_username(&request.username)?;
        let email = normalize_email(&request.email)?;
        validate_password(&request.password)?;
        let display_name = display_name_or(request.display_name.as_deref(), &username)?;
        let digest = hash_password(&request.password);

        let user = self
            .users
            .create_user(CreateUserParams {
                username,
                email,
                display_name,
                password_hash: digest.hash,
                password_salt: digest.salt,
            })
            .await?;

        Ok(self.open_session(&user).await?)
    }

    pub async fn login(&self, request: LoginRequest) -> Result<SessionIssued, AuthError> {
        let username = request.username.trim().to_lowercase();
        let user = self
            .users
            .find_by_username(&username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(&request.password, &user.password_salt, &user.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(self.open_session(&user).await?)
    }

    pub async fn logout(&self, principal: &Principal) -> Result<(), ServiceError> {
        let now = OffsetDateTime::now_utc();
        self.sessions
            .revoke_session(principal.session_id, now)
            .await?;
        Ok(())
    }

    pub async fn authenticate(&self, token: &str) -> Result<Principal, AuthError> {
        let parsed = parse_token(token).ok_or(AuthError::Invalid)?;
        let session = self
            .sessions
            .find_by_prefix(&parsed.prefix)
            .await?
            .ok_or(AuthError::Invalid)?;

        let now = OffsetDateTime::now_utc();
        match session.state_at(now) {
            SessionState::Revoked => return Err(AuthError::Revoked),
            SessionState::Expired => return Err(AuthError::Expired),
            SessionState::Active => {}
        }
        if !session.secret_matches(&parsed.secret) {
            return Err(AuthError::Invalid);
        }

        let user = self
            .users
            .find_user(session.user_id)
            .await?
            .ok_or(AuthError::Invalid)?;

        // best-effort last_used update; do not block auth
        let sessions = self.sessions.clone();
        let session_id = session.id;
        tokio::spawn(async move {
            let _ = sessions.touch_session(session_id, now).await;
        });

        Ok(Principal {
            user_id: user.id,
            username: user.username,
            display_name: user.display_name,
            session_id: session.id,
        })
    }

    async fn open_session(&self, user: &UserRecord) -> Result<SessionIssued, RepoError> {
        let minted = mint_token();
        let expires_at = OffsetDateTime::now_utc() + self.session_ttl;
        self.sessions
            .create_session(CreateSessionParams {
                user_id: user.id,
                prefix: minted.prefix,
                hashed_secret: minted.hashed_secret,
                expires_at,
            })
            .await?;

        Ok(SessionIssued {
            user: user.profile(),
            token: minted.token,
            expires_at,
        })
    }
}
