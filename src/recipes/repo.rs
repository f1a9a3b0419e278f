use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::db::{Page, PageRequest, PgStore, RepoResult};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Recipe {
    pub id: i64,
    pub name: String,
    pub user_id: i64,
    pub category_id: i64,
    pub preparation_time: Option<i32>,
    pub portion: Option<i32>,
    pub preparation_mode: Option<String>,
    pub ingredients: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Which recipes a listing may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeScope {
    Global,
    OwnerScoped(i64),
}

impl RecipeScope {
    fn owner(self) -> Option<i64> {
        match self {
            RecipeScope::Global => None,
            RecipeScope::OwnerScoped(id) => Some(id),
        }
    }

    pub fn admits(self, recipe: &Recipe) -> bool {
        self.owner().map_or(true, |id| recipe.user_id == id)
    }
}

#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub name: String,
    pub user_id: i64,
    pub category_id: i64,
    pub preparation_time: Option<i32>,
    pub portion: Option<i32>,
    pub preparation_mode: Option<String>,
    pub ingredients: Option<String>,
}

/// Partial update. There is no owner field: ownership is fixed at creation.
#[derive(Debug, Clone, Default)]
pub struct RecipeChanges {
    pub name: Option<String>,
    pub category_id: Option<i64>,
    pub preparation_time: Option<i32>,
    pub portion: Option<i32>,
    pub preparation_mode: Option<String>,
    pub ingredients: Option<String>,
}

#[async_trait]
pub trait RecipeRepo: Send + Sync {
    /// Most recent first.
    async fn paginate(&self, scope: RecipeScope, page: PageRequest) -> RepoResult<Page<Recipe>>;
    async fn find(&self, id: i64) -> RepoResult<Option<Recipe>>;
    async fn create(&self, new: NewRecipe) -> RepoResult<Recipe>;
    async fn update(&self, id: i64, changes: RecipeChanges) -> RepoResult<Option<Recipe>>;
    async fn delete(&self, id: i64) -> RepoResult<bool>;
    async fn count_by_category(&self, category_id: i64) -> RepoResult<i64>;
}

const RECIPE_COLUMNS: &str = "id, name, user_id, category_id, preparation_time, portion, \
                              preparation_mode, ingredients, created_at, updated_at";

#[async_trait]
impl RecipeRepo for PgStore {
    async fn paginate(&self, scope: RecipeScope, page: PageRequest) -> RepoResult<Page<Recipe>> {
        let owner = scope.owner();
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM recipes WHERE ($1::BIGINT IS NULL OR user_id = $1)",
        )
        .bind(owner)
        .fetch_one(&self.pool)
        .await?;
        let rows = sqlx::query_as::<_, Recipe>(&format!(
            r#"
            SELECT {RECIPE_COLUMNS}
              FROM recipes
             WHERE ($1::BIGINT IS NULL OR user_id = $1)
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3
            "#
        ))
        .bind(owner)
        .bind(page.per_page)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(Page::new(rows, page, total))
    }

    async fn find(&self, id: i64) -> RepoResult<Option<Recipe>> {
        let row = sqlx::query_as::<_, Recipe>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn create(&self, new: NewRecipe) -> RepoResult<Recipe> {
        let row = sqlx::query_as::<_, Recipe>(&format!(
            r#"
            INSERT INTO recipes (name, user_id, category_id, preparation_time, portion,
                                 preparation_mode, ingredients)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {RECIPE_COLUMNS}
            "#
        ))
        .bind(new.name)
        .bind(new.user_id)
        .bind(new.category_id)
        .bind(new.preparation_time)
        .bind(new.portion)
        .bind(new.preparation_mode)
        .bind(new.ingredients)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update(&self, id: i64, changes: RecipeChanges) -> RepoResult<Option<Recipe>> {
        let row = sqlx::query_as::<_, Recipe>(&format!(
            r#"
            UPDATE recipes
               SET name = COALESCE($2, name),
                   category_id = COALESCE($3, category_id),
                   preparation_time = COALESCE($4, preparation_time),
                   portion = COALESCE($5, portion),
                   preparation_mode = COALESCE($6, preparation_mode),
                   ingredients = COALESCE($7, ingredients),
                   updated_at = now()
             WHERE id = $1
            RETURNING {RECIPE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.name)
        .bind(changes.category_id)
        .bind(changes.preparation_time)
        .bind(changes.portion)
        .bind(changes.preparation_mode)
        .bind(changes.ingredients)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete(&self, id: i64) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn count_by_category(&self, category_id: i64) -> RepoResult<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM recipes WHERE category_id = $1")
            .bind(category_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}
