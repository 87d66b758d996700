//! Account validation and password hashing.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::domain::error::DomainError;

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 32;
pub const PASSWORD_MIN: usize = 8;
pub const PASSWORD_MAX: usize = 256;
pub const DISPLAY_NAME_MAX: usize = 64;
pub const BIO_MAX: usize = 1_000;
pub const EMAIL_MAX: usize = 254;
pub const AVATAR_URL_MAX: usize = 2_048;

const PASSWORD_ITERATIONS: u32 = 20_000;

/// Lowercase and validate a username: 3–32 chars of `[a-z0-9_-]`.
pub fn normalize_username(raw: &str) -> Result<String, DomainError> {
    let username = raw.trim().to_lowercase();
    let len = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err(DomainError::validation(
            "username",
            format!("must be between {USERNAME_MIN} and {USERNAME_MAX} characters"),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    {
        return Err(DomainError::validation(
            "username",
            "may only contain a-z, 0-9, `_` and `-`",
        ));
    }
    Ok(username)
}

/// Lowercase and validate an email address: exactly one `@` with non-empty sides.
pub fn normalize_email(raw: &str) -> Result<String, DomainError> {
    let email = raw.trim().to_lowercase();
    if email.len() > EMAIL_MAX || email.chars().any(char::is_whitespace) {
        return Err(DomainError::validation("email", "is not a valid address"));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(email)
        }
        _ => Err(DomainError::validation("email", "is not a valid address")),
    }
}

pub fn validate_password(password: &str) -> Result<(), DomainError> {
    let len = password.chars().count();
    if len < PASSWORD_MIN {
        return Err(DomainError::validation(
            "password",
            format!("must be at least {PASSWORD_MIN} characters"),
        ));
    }
    if len > PASSWORD_MAX {
        return Err(DomainError::validation(
            "password",
            format!("must be at most {PASSWORD_MAX} characters"),
        ));
    }
    Ok(())
}

/// Validate a display name, falling back to the username when absent or blank.
pub fn display_name_or(raw: Option<&str>, username: &str) -> Result<String, DomainError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        Some(name) if name.chars().count() > DISPLAY_NAME_MAX => Err(DomainError::validation(
            "display_name",
            format!("must be at most {DISPLAY_NAME_MAX} characters"),
        )),
        Some(name) => Ok(name.to_string()),
        None => Ok(username.to_string()),
    }
}

/// Validate an optional free-text profile field; blank input clears it.
pub fn optional_text(
    field: &'static str,
    raw: Option<&str>,
    max: usize,
) -> Result<Option<String>, DomainError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) if value.chars().count() > max => Err(DomainError::validation(
            field,
            format!("must be at most {max} characters"),
        )),
        Some(value) => Ok(Some(value.to_string())),
    }
}

pub fn validate_avatar_url(raw: Option<&str>) -> Result<Option<String>, DomainError> {
    let value = optional_text("avatar_url", raw, AVATAR_URL_MAX)?;
    if let Some(url) = value.as_deref()
        && !(url.starts_with("https://") || url.starts_with("http://"))
    {
        return Err(DomainError::validation(
            "avatar_url",
            "must be an http or https URL",
        ));
    }
    Ok(value)
}

/// A freshly generated salt and the matching password digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordDigest {
    pub salt: Vec<u8>,
    pub hash: Vec<u8>,
}

pub fn hash_password(password: &str) -> PasswordDigest {
    let salt = Uuid::new_v4().as_bytes().to_vec();
    let hash = derive_password_hash(password, &salt);
    PasswordDigest { salt, hash }
}

/// Constant-time comparison of a candidate password against a stored digest.
pub fn verify_password(password: &str, salt: &[u8], expected: &[u8]) -> bool {
    let candidate = derive_password_hash(password, salt);
    candidate.ct_eq(expected).unwrap_u8() == 1
}

fn derive_password_hash(password: &str, salt: &[u8]) -> Vec<u8> {
    let mut digest = {
        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(password.as_bytes());
        hasher.finalize()
    };

    for _ in 1..PASSWORD_ITERATIONS {
        let mut hasher = Sha256::new();
        hasher.update(digest);
        hasher.update(salt);
        digest = hasher.finalize();
    }

    digest.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames_are_lowercased() {
        assert_eq!(normalize_username("  Ada_L ").expect("valid"), "ada_l");
    }

    #[test]
    fn usernames_reject_bad_characters_and_lengths() {
        assert!(normalize_username("ab").is_err());
        assert!(normalize_username(&"a".repeat(USERNAME_MAX + 1)).is_err());
        assert!(normalize_username("has space").is_err());
        assert!(normalize_username("dot.name").is_err());
    }

    #[test]
    fn emails_need_one_at_sign_with_both_sides() {
        assert_eq!(
            normalize_email("Ada@Example.org").expect("valid"),
            "ada@example.org"
        );
        assert!(normalize_email("@example.org").is_err());
        assert!(normalize_email("ada@").is_err());
        assert!(normalize_email("a@b@c").is_err());
        assert!(normalize_email("no-at-sign").is_err());
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert!(validate_password("1234567").is_err());
        assert!(validate_password("12345678").is_ok());
    }

    #[test]
    fn password_round_trip_and_salt_uniqueness() {
        let first = hash_password("correct horse");
        let second = hash_password("correct horse");

        assert_ne!(first.salt, second.salt);
        assert_ne!(first.hash, second.hash);
        assert!(verify_password("correct horse", &first.salt, &first.hash));
        assert!(!verify_password("wrong horse", &first.salt, &first.hash));
    }

    #[test]
    fn display_name_defaults_to_username() {
        assert_eq!(display_name_or(None, "ada").expect("valid"), "ada");
        assert_eq!(display_name_or(Some("  "), "ada").expect("valid"), "ada");
        assert_eq!(
            display_name_or(Some("Ada L."), "ada").expect("valid"),
            "Ada L."
        );
    }

    #[test]
    fn avatar_urls_must_be_web_urls() {
        assert!(validate_avatar_url(Some("javascript:alert(1)")).is_err());
        assert_eq!(validate_avatar_url(Some("")).expect("valid"), None);
        assert!(validate_avatar_url(Some("https://cdn.example.org/a.png")).is_ok());
    }
}
