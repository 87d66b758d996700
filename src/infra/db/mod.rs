//! Postgres-backed repository implementations.

mod answers;
mod articles;
mod challenges;
mod comments;
mod communities;
mod notifications;
mod polls;
mod questions;
mod sessions;
mod tags;
mod users;
mod util;
mod votes;

pub use util::map_sqlx_error;

use std::sync::Arc;

use sqlx::{
    Postgres, QueryBuilder, Transaction,
    postgres::{PgPool, PgPoolOptions},
    query,
};
use uuid::Uuid;

use crate::application::repos::RepoError;
use crate::domain::types::ContentKind;

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Transaction<'_, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    /// Append a case-insensitive `ILIKE` over the given columns.
    fn push_search<'q>(qb: &mut QueryBuilder<'q, Postgres>, columns: &[&str], search: &str) {
        let pattern = format!("%{}%", escape_like(search));
        qb.push(" AND (");
        for (index, column) in columns.iter().enumerate() {
            if index > 0 {
                qb.push(" OR ");
            }
            qb.push(*column);
            qb.push(" ILIKE ");
            qb.push_bind(pattern.clone());
        }
        qb.push(")");
    }

    /// Remove comments and votes attached to a deleted target.
    async fn delete_dependents(
        tx: &mut Transaction<'_, Postgres>,
        kind: ContentKind,
        ids: &[Uuid],
    ) -> Result<(), RepoError> {
        if kind.accepts_comments() {
            let comment_ids: Vec<Uuid> = sqlx::query_scalar(
                "DELETE FROM comments WHERE target_kind = $1 AND target_id = ANY($2) RETURNING id",
            )
            .bind(kind)
            .bind(ids)
            .fetch_all(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

            Self::delete_votes(tx, ContentKind::Comment, &comment_ids).await?;
        }

        Self::delete_votes(tx, kind, ids).await
    }

    async fn delete_votes(
        tx: &mut Transaction<'_, Postgres>,
        kind: ContentKind,
        ids: &[Uuid],
    ) -> Result<(), RepoError> {
        for table in ["votes", "vote_history"] {
            sqlx::query(&format!(
                "DELETE FROM {table} WHERE target_kind = $1 AND target_id = ANY($2)"
            ))
            .bind(kind)
            .bind(ids)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;
        }
        Ok(())
    }
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Score expression for a vote target, usable as a correlated subquery.
fn score_sql(kind: &str, id_column: &str) -> String {
    format!(
        "COALESCE((SELECT SUM(CASE WHEN v.direction = 'up' THEN 1 ELSE -1 END) \
         FROM votes v WHERE v.target_kind = '{kind}' AND v.target_id = {id_column}), 0)::bigint"
    )
}
