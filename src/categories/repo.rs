use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::db::{Page, PageRequest, PgStore, RepoResult};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[async_trait]
pub trait CategoryRepo: Send + Sync {
    async fn paginate(&self, page: PageRequest) -> RepoResult<Page<Category>>;
    async fn find(&self, id: i64) -> RepoResult<Option<Category>>;
    async fn create(&self, name: String) -> RepoResult<Category>;
    async fn update(&self, id: i64, name: Option<String>) -> RepoResult<Option<Category>>;
    async fn delete(&self, id: i64) -> RepoResult<bool>;
}

#[async_trait]
impl CategoryRepo for PgStore {
    async fn paginate(&self, page: PageRequest) -> RepoResult<Page<Category>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
            .fetch_one(&self.pool)
            .await?;
        let rows = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, name, created_at, updated_at
              FROM categories
             ORDER BY id
             LIMIT $1 OFFSET $2
            "#,
        )
        .bind(page.per_page)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(Page::new(rows, page, total))
    }

    async fn find(&self, id: i64) -> RepoResult<Option<Category>> {
        let row = sqlx::query_as::<_, Category>(
            "SELECT id, name, created_at, updated_at FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn create(&self, name: String) -> RepoResult<Category> {
        let row = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (name)
            VALUES ($1)
            RETURNING id, name, created_at, updated_at
            "#,
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update(&self, id: i64, name: Option<String>) -> RepoResult<Option<Category>> {
        let row = sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories
               SET name = COALESCE($2, name),
                   updated_at = now()
             WHERE id = $1
            RETURNING id, name, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete(&self, id: i64) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
