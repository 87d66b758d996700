//! Sanitisation and length rules for user-generated text.
//!
//! Bodies are stored as sanitised HTML fragments. The allow-list is small:
//! formatting, lists, links, code and quotes. Anything else is stripped
//! before length checks run, so a body made only of script tags is empty.

use std::collections::HashSet;
use std::sync::LazyLock;

use ammonia::Builder as AmmoniaBuilder;

use crate::domain::error::DomainError;

pub const QUESTION_TITLE_MIN: usize = 5;
pub const QUESTION_TITLE_MAX: usize = 300;
pub const ARTICLE_TITLE_MAX: usize = 300;
pub const COMMENT_BODY_MAX: usize = 600;
pub const BODY_MAX: usize = 50_000;

static SANITIZER: LazyLock<AmmoniaBuilder<'static>> = LazyLock::new(body_sanitizer);

fn body_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();

    let tags: HashSet<&'static str> = HashSet::from([
        "a",
        "b",
        "blockquote",
        "br",
        "code",
        "em",
        "h2",
        "h3",
        "h4",
        "hr",
        "i",
        "li",
        "ol",
        "p",
        "pre",
        "s",
        "strong",
        "sub",
        "sup",
        "ul",
    ]);
    builder.tags(tags);
    builder.generic_attributes(HashSet::from(["title"]));
    builder.add_tag_attributes("code", &["class"]);
    builder.link_rel(Some("nofollow noopener noreferrer"));
    builder.url_schemes(HashSet::from(["http", "https", "mailto"]));

    builder
}

/// Strip disallowed markup from a body and trim surrounding whitespace.
pub fn sanitize_body(raw: &str) -> String {
    SANITIZER.clean(raw).to_string().trim().to_string()
}

/// Sanitise a body and require it to be non-empty and within `max` characters.
pub fn clean_body(field: &'static str, raw: &str, max: usize) -> Result<String, DomainError> {
    let cleaned = sanitize_body(raw);
    if cleaned.is_empty() {
        return Err(DomainError::validation(field, "must not be empty"));
    }
    if cleaned.chars().count() > max {
        return Err(DomainError::validation(
            field,
            format!("must be at most {max} characters"),
        ));
    }
    Ok(cleaned)
}

/// Trim a plain-text field and check its character length.
pub fn clean_text(
    field: &'static str,
    raw: &str,
    min: usize,
    max: usize,
) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    let len = trimmed.chars().count();
    if len < min || len > max {
        return Err(DomainError::validation(
            field,
            format!("must be between {min} and {max} characters"),
        ));
    }
    Ok(trimmed.to_string())
}

pub fn clean_question_title(raw: &str) -> Result<String, DomainError> {
    clean_text("title", raw, QUESTION_TITLE_MIN, QUESTION_TITLE_MAX)
}

pub fn clean_comment_body(raw: &str) -> Result<String, DomainError> {
    clean_body("body", raw, COMMENT_BODY_MAX)
}

/// Short single-line excerpt of a body, used in notification messages.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let mut cut: String = flat.chars().take(max_chars).collect();
    cut.push('…');
    cut
}
