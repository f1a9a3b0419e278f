use async_trait::async_trait;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::{PgStore, RepoResult};

/// Issued bearer token; the row's existence is what keeps the token valid.
#[derive(Debug, Clone, FromRow, PartialEq)]
pub struct AccessToken {
    pub id: Uuid,
    pub user_id: i64,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert(&self, id: Uuid, user_id: i64, expires_at: OffsetDateTime) -> RepoResult<AccessToken>;
    async fn find(&self, id: Uuid) -> RepoResult<Option<AccessToken>>;
    /// Returns whether the token existed.
    async fn revoke(&self, id: Uuid) -> RepoResult<bool>;
    async fn purge_expired(&self, now: OffsetDateTime) -> RepoResult<u64>;
}

#[async_trait]
impl TokenStore for PgStore {
    async fn insert(&self, id: Uuid, user_id: i64, expires_at: OffsetDateTime) -> RepoResult<AccessToken> {
        let row = sqlx::query_as::<_, AccessToken>(
            r#"
            INSERT INTO access_tokens (id, user_id, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, created_at, expires_at
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find(&self, id: Uuid) -> RepoResult<Option<AccessToken>> {
        let row = sqlx::query_as::<_, AccessToken>(
            "SELECT id, user_id, created_at, expires_at FROM access_tokens WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn revoke(&self, id: Uuid) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM access_tokens WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> RepoResult<u64> {
        let res = sqlx::query("DELETE FROM access_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }
}
