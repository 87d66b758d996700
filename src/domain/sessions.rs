//! Session tokens: `ag_<prefix>_<secret>`.
//!
//! The prefix is stored in clear and indexed for lookup; only the SHA-256 of
//! the secret is persisted.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use time::OffsetDateTime;
use uuid::Uuid;

pub const TOKEN_TAG: &str = "ag";
const PREFIX_LEN: usize = 12;
const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub prefix: String,
    pub hashed_secret: Vec<u8>,
    pub expires_at: OffsetDateTime,
    pub revoked_at: Option<OffsetDateTime>,
    pub last_used_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Expired,
    Revoked,
}

impl SessionRecord {
    pub fn state_at(&self, now: OffsetDateTime) -> SessionState {
        if self.revoked_at.is_some_and(|revoked_at| revoked_at <= now) {
            return SessionState::Revoked;
        }
        if self.expires_at <= now {
            return SessionState::Expired;
        }
        SessionState::Active
    }

    pub fn secret_matches(&self, secret: &str) -> bool {
        self.hashed_secret.ct_eq(&hash_secret(secret)).unwrap_u8() == 1
    }
}

/// A newly minted token with the parts the store needs.
#[derive(Debug, Clone)]
pub struct MintedToken {
    pub token: String,
    pub prefix: String,
    pub hashed_secret: Vec<u8>,
}

pub fn mint_token() -> MintedToken {
    let prefix = Uuid::new_v4().simple().to_string()[..PREFIX_LEN].to_string();
    let secret = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
    MintedToken {
        token: format!("{TOKEN_TAG}_{prefix}_{secret}"),
        hashed_secret: hash_secret(&secret),
        prefix,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedToken {
    pub prefix: String,
    pub secret: String,
}

pub fn parse_token(token: &str) -> Option<ParsedToken> {
    let mut parts = token.trim().splitn(3, '_');
    if parts.next()? != TOKEN_TAG {
        return None;
    }
    let prefix = parts.next()?;
    let secret = parts.next()?;
    if prefix.is_empty() || secret.len() < MIN_SECRET_LEN {
        return None;
    }
    Some(ParsedToken {
        prefix: prefix.to_string(),
        secret: secret.to_string(),
    })
}

pub fn hash_secret(secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;

    fn session_for(token: &MintedToken, now: OffsetDateTime) -> SessionRecord {
        SessionRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            prefix: token.prefix.clone(),
            hashed_secret: token.hashed_secret.clone(),
            expires_at: now + Duration::days(30),
            revoked_at: None,
            last_used_at: None,
            created_at: now,
        }
    }

    #[test]
    fn minted_tokens_parse_back() {
        let minted = mint_token();
        let parsed = parse_token(&minted.token).expect("parsable token");

        assert!(minted.token.starts_with("ag_"));
        assert_eq!(parsed.prefix, minted.prefix);
        assert_eq!(hash_secret(&parsed.secret), minted.hashed_secret);
    }

    #[test]
    fn foreign_or_truncated_tokens_are_rejected() {
        assert!(parse_token("sk_abc_0123456789abcdef0123456789abcdef").is_none());
        assert!(parse_token("ag_abc_short").is_none());
        assert!(parse_token("ag__0123456789abcdef0123456789abcdef").is_none());
        assert!(parse_token("").is_none());
    }

    #[test]
    fn secret_comparison_detects_tampering() {
        let now = OffsetDateTime::now_utc();
        let minted = mint_token();
        let session = session_for(&minted, now);
        let parsed = parse_token(&minted.token).expect("parsable token");

        assert!(session.secret_matches(&parsed.secret));
        assert!(!session.secret_matches(&format!("{}x", parsed.secret)));
    }

    #[test]
    fn session_state_tracks_expiry_and_revocation() {
        let now = OffsetDateTime::now_utc();
        let mut session = session_for(&mint_token(), now);

        assert_eq!(session.state_at(now), SessionState::Active);
        assert_eq!(
            session.state_at(now + Duration::days(31)),
            SessionState::Expired
        );

        session.revoked_at = Some(now);
        assert_eq!(session.state_at(now), SessionState::Revoked);
    }
}
