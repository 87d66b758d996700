//! Poll validation and the open/closed state machine.

use time::{Duration, OffsetDateTime};

use crate::domain::content::clean_text;
use crate::domain::entities::PollRecord;
use crate::domain::error::DomainError;
use crate::domain::types::PollStatus;

pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 10;
pub const OPTION_LABEL_MAX: usize = 120;
pub const QUESTION_MIN: usize = 5;
pub const QUESTION_MAX: usize = 300;
pub const MAX_OPEN_DAYS: i64 = 90;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidPoll {
    pub question: String,
    pub options: Vec<String>,
    pub closes_at: OffsetDateTime,
}

/// Validate a new poll: 2–10 distinct non-empty options and a deadline in
/// the future no more than 90 days ahead.
pub fn validate_new_poll(
    question: &str,
    options: &[String],
    closes_at: OffsetDateTime,
    now: OffsetDateTime,
) -> Result<ValidPoll, DomainError> {
    let question = clean_text("question", question, QUESTION_MIN, QUESTION_MAX)?;

    let mut labels: Vec<String> = Vec::with_capacity(options.len());
    for raw in options {
        let label = clean_text("options", raw, 1, OPTION_LABEL_MAX)?;
        if labels
            .iter()
            .any(|existing| existing.to_lowercase() == label.to_lowercase())
        {
            return Err(DomainError::validation(
                "options",
                format!("duplicate option `{label}`"),
            ));
        }
        labels.push(label);
    }
    if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&labels.len()) {
        return Err(DomainError::validation(
            "options",
            format!("a poll needs between {MIN_OPTIONS} and {MAX_OPTIONS} options"),
        ));
    }

    if closes_at <= now {
        return Err(DomainError::validation(
            "closes_at",
            "must be in the future",
        ));
    }
    if closes_at > now + Duration::days(MAX_OPEN_DAYS) {
        return Err(DomainError::validation(
            "closes_at",
            format!("must be within {MAX_OPEN_DAYS} days"),
        ));
    }

    Ok(ValidPoll {
        question,
        options: labels,
        closes_at,
    })
}

impl PollRecord {
    /// A poll takes votes only while open and before its deadline.
    pub fn accepts_votes_at(&self, now: OffsetDateTime) -> bool {
        self.status == PollStatus::Open && now < self.closes_at
    }
}
