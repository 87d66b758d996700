//! Shared cursor pagination helpers.
//!
//! Cursors are opaque to clients: URL-safe base64 over a small JSON payload.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct OffsetCursorPayload {
    offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct NotificationCursorPayload {
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    id: Uuid,
}

/// Position in a list that is ordered in memory rather than by the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetCursor {
    offset: u32,
}

/// Keyset cursor for a recipient's notifications, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationCursor {
    created_at: OffsetDateTime,
    id: Uuid,
}

impl OffsetCursor {
    pub fn new(offset: u32) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn encode(&self) -> String {
        encode_payload(&OffsetCursorPayload {
            offset: self.offset,
        })
    }

    pub fn decode(cursor: &str) -> Result<Self, PaginationError> {
        let payload: OffsetCursorPayload = decode_payload(cursor)?;
        Ok(Self {
            offset: payload.offset,
        })
    }
}

impl NotificationCursor {
    pub fn new(created_at: OffsetDateTime, id: Uuid) -> Self {
        Self { created_at, id }
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn encode(&self) -> String {
        encode_payload(&NotificationCursorPayload {
            created_at: self.created_at,
            id: self.id,
        })
    }

    pub fn decode(cursor: &str) -> Result<Self, PaginationError> {
        let payload: NotificationCursorPayload = decode_payload(cursor)?;
        Ok(Self {
            created_at: payload.created_at,
            id: payload.id,
        })
    }
}

fn encode_payload<T: Serialize>(payload: &T) -> String {
    let serialized =
        serde_json::to_vec(payload).expect("serializing cursor payload should succeed");
    URL_SAFE_NO_PAD.encode(serialized)
}

fn decode_payload<T: DeserializeOwned>(cursor: &str) -> Result<T, PaginationError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(cursor)
        .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|err| PaginationError::InvalidCursor(err.to_string()))
}

/// Cursor-aware pagination request.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<C> {
    pub limit: u32,
    pub cursor: Option<C>,
}

impl<C> PageRequest<C> {
    /// Clamp the requested limit into `1..=MAX_LIMIT`, defaulting when absent.
    pub fn new(limit: Option<u32>, cursor: Option<C>) -> Self {
        Self {
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
            cursor,
        }
    }
}

/// Cursor-aware page result.
#[derive(Debug, Clone, Serialize)]
pub struct CursorPage<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> CursorPage<T> {
    pub fn new(items: Vec<T>, next_cursor: Option<String>) -> Self {
        Self { items, next_cursor }
    }

    /// Slice an already ordered list at an offset cursor.
    pub fn from_sorted(items: Vec<T>, request: PageRequest<OffsetCursor>) -> Self {
        let start = request.cursor.map(|c| c.offset() as usize).unwrap_or(0);
        let limit = request.limit as usize;
        let total = items.len();

        let page: Vec<T> = items.into_iter().skip(start).take(limit).collect();
        let end = start.saturating_add(page.len());
        let next_cursor = (end < total)
            .then(|| u32::try_from(end).ok())
            .flatten()
            .map(|offset| OffsetCursor::new(offset).encode());

        Self::new(page, next_cursor)
    }
}

#[derive(Debug, Error)]
pub enum PaginationError {
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_pages_walk_the_whole_list() {
        let items: Vec<u32> = (0..5).collect();

        let first = CursorPage::from_sorted(items.clone(), PageRequest::new(Some(2), None));
        assert_eq!(first.items, [0, 1]);
        let cursor = OffsetCursor::decode(first.next_cursor.as_deref().expect("more pages"))
            .expect("valid cursor");

        let second = CursorPage::from_sorted(items.clone(), PageRequest::new(Some(2), Some(cursor)));
        assert_eq!(second.items, [2, 3]);
        let cursor = OffsetCursor::decode(second.next_cursor.as_deref().expect("more pages"))
            .expect("valid cursor");

        let last = CursorPage::from_sorted(items, PageRequest::new(Some(2), Some(cursor)));
        assert_eq!(last.items, [4]);
        assert!(last.next_cursor.is_none());
    }

    #[test]
    fn cursor_past_the_end_yields_an_empty_page() {
        let page = CursorPage::from_sorted(
            vec![1, 2, 3],
            PageRequest::new(None, Some(OffsetCursor::new(10))),
        );
        assert!(page.items.is_empty());
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn limits_are_clamped() {
        assert_eq!(PageRequest::<OffsetCursor>::new(Some(0), None).limit, 1);
        assert_eq!(PageRequest::<OffsetCursor>::new(Some(500), None).limit, MAX_LIMIT);
        assert_eq!(PageRequest::<OffsetCursor>::new(None, None).limit, DEFAULT_LIMIT);
    }

    #[test]
    fn notification_cursor_survives_encoding() {
        let when = OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("timestamp");
        let id = Uuid::new_v4();
        let decoded = NotificationCursor::decode(&NotificationCursor::new(when, id).encode())
            .expect("decoded");
        assert_eq!(decoded.created_at(), when);
        assert_eq!(decoded.id(), id);
    }

    #[test]
    fn decoding_invalid_cursor_reports_error() {
        let err = OffsetCursor::decode("not-base64!").expect_err("invalid cursor rejected");
        assert!(matches!(err, PaginationError::InvalidCursor(_)));
    }
}
