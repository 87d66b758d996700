//! Question rules: tag lists and the comparator-based list ordering.

use std::cmp::Ordering;

use crate::domain::entities::QuestionSummary;
use crate::domain::error::DomainError;
use crate::domain::slug::normalize_tag;
use crate::domain::types::QuestionOrder;

pub const MAX_TAGS: usize = 5;

/// Reputation granted to an answer author when their answer is accepted.
pub const ACCEPTED_ANSWER_REPUTATION: i64 = 15;

/// Normalise and deduplicate tag names, preserving first-seen order.
pub fn normalize_tags(raw: &[String]) -> Result<Vec<String>, DomainError> {
    let mut tags: Vec<String> = Vec::with_capacity(raw.len());
    for candidate in raw {
        let tag = normalize_tag(candidate)
            .map_err(|err| DomainError::validation("tags", err.to_string()))?;
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    if tags.len() > MAX_TAGS {
        return Err(DomainError::validation(
            "tags",
            format!("at most {MAX_TAGS} tags are allowed"),
        ));
    }
    Ok(tags)
}

/// Keep only the entries an order applies to, then sort them in place.
pub fn apply_order(items: &mut Vec<QuestionSummary>, order: QuestionOrder) {
    if order == QuestionOrder::Unanswered {
        items.retain(|item| item.answer_count == 0);
    }
    items.sort_by(|a, b| compare(a, b, order));
}

pub fn compare(a: &QuestionSummary, b: &QuestionSummary, order: QuestionOrder) -> Ordering {
    let primary = match order {
        QuestionOrder::Newest | QuestionOrder::Unanswered => Ordering::Equal,
        QuestionOrder::Active => b.last_activity_at.cmp(&a.last_activity_at),
        QuestionOrder::MostViewed => b.views.cmp(&a.views),
        QuestionOrder::Top => b.score.cmp(&a.score),
    };
    primary.then_with(|| newest_first(a, b))
}

fn newest_first(a: &QuestionSummary, b: &QuestionSummary) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use time::{Duration, OffsetDateTime};
    use uuid::Uuid;

    use super::*;
    use crate::domain::entities::AuthorRef;

    fn summary(title: &str, age_minutes: i64) -> QuestionSummary {
        let created = OffsetDateTime::UNIX_EPOCH + Duration::days(20_000)
            - Duration::minutes(age_minutes);
        QuestionSummary {
            id: Uuid::new_v4(),
            title: title.to_string(),
            author: AuthorRef {
                id: Uuid::nil(),
                username: "ada".into(),
                display_name: "Ada".into(),
            },
            community_id: None,
            tags: Vec::new(),
            views: 0,
            score: 0,
            answer_count: 0,
            has_accepted_answer: false,
            created_at: created,
            last_activity_at: created,
        }
    }

    fn titles(items: &[QuestionSummary]) -> Vec<&str> {
        items.iter().map(|item| item.title.as_str()).collect()
    }

    #[test]
    fn newest_sorts_by_creation_time() {
        let mut items = vec![summary("old", 30), summary("new", 1), summary("mid", 10)];
        apply_order(&mut items, QuestionOrder::Newest);
        assert_eq!(titles(&items), ["new", "mid", "old"]);
    }

    #[test]
    fn active_prefers_recent_answers() {
        let mut stale = summary("stale", 5);
        let mut revived = summary("revived", 60);
        revived.last_activity_at = stale.created_at + Duration::minutes(1);
        stale.answer_count = 0;
        revived.answer_count = 1;

        let mut items = vec![stale, revived];
        apply_order(&mut items, QuestionOrder::Active);
        assert_eq!(titles(&items), ["revived", "stale"]);
    }

    #[test]
    fn unanswered_filters_then_sorts_newest_first() {
        let mut answered = summary("answered", 1);
        answered.answer_count = 2;
        let mut items = vec![summary("older", 20), answered, summary("newer", 2)];

        apply_order(&mut items, QuestionOrder::Unanswered);
        assert_eq!(titles(&items), ["newer", "older"]);
    }

    #[test]
    fn top_and_most_viewed_fall_back_to_newest() {
        let mut a = summary("a", 10);
        a.score = 3;
        a.views = 1;
        let mut b = summary("b", 5);
        b.score = 3;
        b.views = 9;
        let mut c = summary("c", 1);
        c.score = -1;
        c.views = 9;

        let mut top = vec![a.clone(), b.clone(), c.clone()];
        apply_order(&mut top, QuestionOrder::Top);
        assert_eq!(titles(&top), ["b", "a", "c"]);

        let mut viewed = vec![a, b, c];
        apply_order(&mut viewed, QuestionOrder::MostViewed);
        assert_eq!(titles(&viewed), ["c", "b", "a"]);
    }

    #[test]
    fn tags_are_normalised_and_deduplicated() {
        let tags = normalize_tags(&["Rust".into(), "rust".into(), "Async IO".into()])
            .expect("valid tags");
        assert_eq!(tags, ["rust", "async-io"]);
    }

    #[test]
    fn too_many_tags_are_rejected() {
        let raw: Vec<String> = (0..6).map(|i| format!("tag{i}")).collect();
        let err = normalize_tags(&raw).expect_err("six tags");
        assert_eq!(err.field(), Some("tags"));
    }
}
