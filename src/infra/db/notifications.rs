use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{CursorPage, NotificationCursor, PageRequest};
use crate::application::repos::{NotificationsRepo, RepoError};
use crate::domain::entities::NotificationRecord;
use crate::domain::notifications::{EntityKind, NotificationDraft};
use crate::domain::types::NotificationKind;

use super::{PostgresRepositories, map_sqlx_error};

const NOTIFICATION_COLUMNS: &str =
    "id, recipient_id, actor_id, kind, entity_kind, entity_id, message, read_at, created_at";

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    recipient_id: Uuid,
    actor_id: Option<Uuid>,
    kind: NotificationKind,
    entity_kind: EntityKind,
    entity_id: Uuid,
    message: String,
    read_at: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
}

impl From<NotificationRow> for NotificationRecord {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: row.id,
            recipient_id: row.recipient_id,
            actor_id: row.actor_id,
            kind: row.kind,
            entity_kind: row.entity_kind,
            entity_id: row.entity_id,
            message: row.message,
            read_at: row.read_at,
            created_at: row.created_at,
        }
    }
}

#[async_trait::async_trait]
impl NotificationsRepo for PostgresRepositories {
    async fn insert_many(
        &self,
        drafts: Vec<NotificationDraft>,
    ) -> Result<Vec<NotificationRecord>, RepoError> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }

        let now = OffsetDateTime::now_utc();
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        let mut created = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let row: NotificationRow = sqlx::query_as(&format!(
                "INSERT INTO notifications \
                     (id, recipient_id, actor_id, kind, entity_kind, entity_id, message, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {NOTIFICATION_COLUMNS}"
            ))
            .bind(Uuid::new_v4())
            .bind(draft.recipient_id)
            .bind(draft.actor_id)
            .bind(draft.kind)
            .bind(draft.entity_kind)
            .bind(draft.entity_id)
            .bind(&draft.message)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
            created.push(row.into());
        }
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(created)
    }

    async fn list_for(
        &self,
        recipient_id: Uuid,
        unread_only: bool,
        page: PageRequest<NotificationCursor>,
    ) -> Result<CursorPage<NotificationRecord>, RepoError> {
        let (cursor_created_at, cursor_id) = page
            .cursor
            .map(|c| (Some(c.created_at()), Some(c.id())))
            .unwrap_or((None, None));
        let limit = i64::from(page.limit);

        let rows: Vec<NotificationRow> = sqlx::query_as(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE recipient_id = $1 \
               AND ($2 = FALSE OR read_at IS NULL) \
               AND ($3::timestamptz IS NULL OR (created_at, id) < ($3, $4)) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $5"
        ))
        .bind(recipient_id)
        .bind(unread_only)
        .bind(cursor_created_at)
        .bind(cursor_id)
        .bind(limit + 1)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut items: Vec<NotificationRecord> = rows.into_iter().map(Into::into).collect();
        let next_cursor = if items.len() as i64 > limit {
            items.pop();
            items
                .last()
                .map(|last| NotificationCursor::new(last.created_at, last.id).encode())
        } else {
            None
        };

        Ok(CursorPage::new(items, next_cursor))
    }

    async fn unread_count(&self, recipient_id: Uuid) -> Result<i64, RepoError> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND read_at IS NULL",
        )
        .bind(recipient_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn mark_read(
        &self,
        id: Uuid,
        recipient_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<bool, RepoError> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = COALESCE(read_at, $3) \
             WHERE id = $1 AND recipient_id = $2",
        )
        .bind(id)
        .bind(recipient_id)
        .bind(now)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() == 1)
    }

    async fn mark_all_read(
        &self,
        recipient_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<u64, RepoError> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = $2 WHERE recipient_id = $1 AND read_at IS NULL",
        )
        .bind(recipient_id)
        .bind(now)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }
}
