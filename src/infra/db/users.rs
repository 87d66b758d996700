use sqlx::PgConnection;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{CreateUserParams, RepoError, UpdateProfileParams, UsersRepo};
use crate::domain::entities::UserRecord;

use super::{PostgresRepositories, map_sqlx_error};

const USER_COLUMNS: &str = "id, username, email, display_name, bio, avatar_url, password_hash, \
     password_salt, reputation, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    display_name: String,
    bio: Option<String>,
    avatar_url: Option<String>,
    password_hash: Vec<u8>,
    password_salt: Vec<u8>,
    reputation: i64,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            display_name: row.display_name,
            bio: row.bio,
            avatar_url: row.avatar_url,
            password_hash: row.password_hash,
            password_salt: row.password_salt,
            reputation: row.reputation,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl PostgresRepositories {
    /// Shift a user's reputation on an open connection or transaction.
    pub(super) async fn shift_reputation(
        conn: &mut PgConnection,
        id: Uuid,
        delta: i64,
    ) -> Result<(), RepoError> {
        let result = sqlx::query("UPDATE users SET reputation = reputation + $2 WHERE id = $1")
            .bind(id)
            .bind(delta)
            .execute(conn)
            .await
            .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl UsersRepo for PostgresRepositories {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let row: UserRow = sqlx::query_as(&format!(
            "INSERT INTO users (id, username, email, display_name, password_hash, password_salt, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&params.username)
        .bind(&params.email)
        .bind(&params.display_name)
        .bind(&params.password_hash)
        .bind(&params.password_salt)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(self.pool())
                .await
                .map_err(map_sqlx_error)?;
        Ok(row.map(Into::into))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1"))
                .bind(username)
                .fetch_optional(self.pool())
                .await
                .map_err(map_sqlx_error)?;
        Ok(row.map(Into::into))
    }

    async fn list_users(
        &self,
        search: Option<&str>,
        limit: u32,
    ) -> Result<Vec<UserRecord>, RepoError> {
        let mut qb = sqlx::QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users WHERE TRUE"));
        if let Some(search) = search {
            Self::push_search(&mut qb, &["username", "display_name"], search);
        }
        qb.push(" ORDER BY reputation DESC, username ASC LIMIT ");
        qb.push_bind(i64::from(limit));

        let rows: Vec<UserRow> = qb
            .build_query_as::<UserRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_profile(&self, params: UpdateProfileParams) -> Result<UserRecord, RepoError> {
        let row: UserRow = sqlx::query_as(&format!(
            "UPDATE users SET display_name = $2, bio = $3, avatar_url = $4, updated_at = $5 \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(params.id)
        .bind(&params.display_name)
        .bind(&params.bio)
        .bind(&params.avatar_url)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.into())
    }
}
