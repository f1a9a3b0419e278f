//! In-process gateway used by `STORAGE=memory` and by the test suite.
//!
//! Mirrors the Postgres schema's rules: unique emails, foreign keys from
//! recipes to users and categories, `ON DELETE CASCADE` from users and
//! `ON DELETE RESTRICT` from categories.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    auth::repo::{AccessToken, TokenStore},
    categories::repo::{Category, CategoryRepo},
    db::{Page, PageRequest, RepoError, RepoResult},
    recipes::repo::{NewRecipe, Recipe, RecipeChanges, RecipeRepo, RecipeScope},
    users::repo::{NewUser, User, UserChanges, UserRepo},
};

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    categories: BTreeMap<i64, Category>,
    recipes: BTreeMap<i64, Recipe>,
    tokens: HashMap<Uuid, AccessToken>,
    next_user: i64,
    next_category: i64,
    next_recipe: i64,
}

impl Tables {
    fn email_taken(&self, email: &str, except: Option<i64>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }

    fn check_recipe_refs(&self, user_id: i64, category_id: i64) -> RepoResult<()> {
        if !self.users.contains_key(&user_id) {
            return Err(RepoError::Constraint(format!(
                "recipes_user_id_fkey: user {user_id} does not exist"
            )));
        }
        if !self.categories.contains_key(&category_id) {
            return Err(RepoError::Constraint(format!(
                "recipes_category_id_fkey: category {category_id} does not exist"
            )));
        }
        Ok(())
    }
}

fn slice<T: Clone>(rows: Vec<&T>, page: PageRequest) -> Page<T> {
    let total = rows.len() as i64;
    let data = rows
        .into_iter()
        .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
        .take(usize::try_from(page.per_page).unwrap_or(0))
        .cloned()
        .collect();
    Page::new(data, page, total)
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn paginate(&self, page: PageRequest) -> RepoResult<Page<User>> {
        let t = self.tables.read().await;
        Ok(slice(t.users.values().collect(), page))
    }

    async fn find(&self, id: i64) -> RepoResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.values().find(|u| u.email == email).cloned())
    }

    async fn create(&self, new: NewUser) -> RepoResult<User> {
        let mut t = self.tables.write().await;
        if t.email_taken(&new.email, None) {
            return Err(RepoError::Constraint("users_email_key: email already exists".into()));
        }
        t.next_user += 1;
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: t.next_user,
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            created_at: now,
            updated_at: now,
        };
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update(&self, id: i64, changes: UserChanges) -> RepoResult<Option<User>> {
        let mut t = self.tables.write().await;
        if let Some(email) = &changes.email {
            if t.email_taken(email, Some(id)) {
                return Err(RepoError::Constraint("users_email_key: email already exists".into()));
            }
        }
        let Some(user) = t.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: i64) -> RepoResult<bool> {
        let mut t = self.tables.write().await;
        if t.users.remove(&id).is_none() {
            return Ok(false);
        }
        t.recipes.retain(|_, r| r.user_id != id);
        t.tokens.retain(|_, tok| tok.user_id != id);
        Ok(true)
    }
}

#[async_trait]
impl CategoryRepo for MemoryStore {
    async fn paginate(&self, page: PageRequest) -> RepoResult<Page<Category>> {
        let t = self.tables.read().await;
        Ok(slice(t.categories.values().collect(), page))
    }

    async fn find(&self, id: i64) -> RepoResult<Option<Category>> {
        Ok(self.tables.read().await.categories.get(&id).cloned())
    }

    async fn create(&self, name: String) -> RepoResult<Category> {
        let mut t = self.tables.write().await;
        t.next_category += 1;
        let now = OffsetDateTime::now_utc();
        let category = Category {
            id: t.next_category,
            name,
            created_at: now,
            updated_at: now,
        };
        t.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn update(&self, id: i64, name: Option<String>) -> RepoResult<Option<Category>> {
        let mut t = self.tables.write().await;
        let Some(category) = t.categories.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = name {
            category.name = name;
        }
        category.updated_at = OffsetDateTime::now_utc();
        Ok(Some(category.clone()))
    }

    async fn delete(&self, id: i64) -> RepoResult<bool> {
        let mut t = self.tables.write().await;
        if t.recipes.values().any(|r| r.category_id == id) {
            return Err(RepoError::Constraint(format!(
                "recipes_category_id_fkey: category {id} is still referenced"
            )));
        }
        Ok(t.categories.remove(&id).is_some())
    }
}

#[async_trait]
impl RecipeRepo for MemoryStore {
    async fn paginate(&self, scope: RecipeScope, page: PageRequest) -> RepoResult<Page<Recipe>> {
        let t = self.tables.read().await;
        let mut rows: Vec<&Recipe> = t.recipes.values().filter(|r| scope.admits(r)).collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(slice(rows, page))
    }

    async fn find(&self, id: i64) -> RepoResult<Option<Recipe>> {
        Ok(self.tables.read().await.recipes.get(&id).cloned())
    }

    async fn create(&self, new: NewRecipe) -> RepoResult<Recipe> {
        let mut t = self.tables.write().await;
        t.check_recipe_refs(new.user_id, new.category_id)?;
        t.next_recipe += 1;
        let now = OffsetDateTime::now_utc();
        let recipe = Recipe {
            id: t.next_recipe,
            name: new.name,
            user_id: new.user_id,
            category_id: new.category_id,
            preparation_time: new.preparation_time,
            portion: new.portion,
            preparation_mode: new.preparation_mode,
            ingredients: new.ingredients,
            created_at: now,
            updated_at: now,
        };
        t.recipes.insert(recipe.id, recipe.clone());
        Ok(recipe)
    }

    async fn update(&self, id: i64, changes: RecipeChanges) -> RepoResult<Option<Recipe>> {
        let mut t = self.tables.write().await;
        let Some(owner) = t.recipes.get(&id).map(|r| r.user_id) else {
            return Ok(None);
        };
        if let Some(category_id) = changes.category_id {
            t.check_recipe_refs(owner, category_id)?;
        }
        let Some(recipe) = t.recipes.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(v) = changes.name {
            recipe.name = v;
        }
        if let Some(v) = changes.category_id {
            recipe.category_id = v;
        }
        if let Some(v) = changes.preparation_time {
            recipe.preparation_time = Some(v);
        }
        if let Some(v) = changes.portion {
            recipe.portion = Some(v);
        }
        if let Some(v) = changes.preparation_mode {
            recipe.preparation_mode = Some(v);
        }
        if let Some(v) = changes.ingredients {
            recipe.ingredients = Some(v);
        }
        recipe.updated_at = OffsetDateTime::now_utc();
        Ok(Some(recipe.clone()))
    }

    async fn delete(&self, id: i64) -> RepoResult<bool> {
        Ok(self.tables.write().await.recipes.remove(&id).is_some())
    }

    async fn count_by_category(&self, category_id: i64) -> RepoResult<i64> {
        let t = self.tables.read().await;
        Ok(t.recipes.values().filter(|r| r.category_id == category_id).count() as i64)
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn insert(&self, id: Uuid, user_id: i64, expires_at: OffsetDateTime) -> RepoResult<AccessToken> {
        let mut t = self.tables.write().await;
        if !t.users.contains_key(&user_id) {
            return Err(RepoError::Constraint(format!(
                "access_tokens_user_id_fkey: user {user_id} does not exist"
            )));
        }
        let token = AccessToken {
            id,
            user_id,
            created_at: OffsetDateTime::now_utc(),
            expires_at,
        };
        t.tokens.insert(id, token.clone());
        Ok(token)
    }

    async fn find(&self, id: Uuid) -> RepoResult<Option<AccessToken>> {
        Ok(self.tables.read().await.tokens.get(&id).cloned())
    }

    async fn revoke(&self, id: Uuid) -> RepoResult<bool> {
        Ok(self.tables.write().await.tokens.remove(&id).is_some())
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> RepoResult<u64> {
        let mut t = self.tables.write().await;
        let before = t.tokens.len();
        t.tokens.retain(|_, tok| tok.expires_at > now);
        Ok((before - t.tokens.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed_user(store: &MemoryStore, email: &str) -> User {
        UserRepo::create(
            store,
            NewUser {
                name: "Ana".into(),
                email: email.into(),
                password_hash: "hash".into(),
            },
        )
        .await
        .unwrap()
    }

    fn bolo(user_id: i64, category_id: i64) -> NewRecipe {
        NewRecipe {
            name: "Bolo".into(),
            user_id,
            category_id,
            preparation_time: Some(60),
            portion: Some(8),
            preparation_mode: Some("Misture e asse.".into()),
            ingredients: Some("ovos, farinha".into()),
        }
    }

    #[tokio::test]
    async fn unique_email_is_enforced() {
        let store = MemoryStore::new();
        seed_user(&store, "a@x.com").await;
        let err = UserRepo::create(
            &store,
            NewUser {
                name: "B".into(),
                email: "a@x.com".into(),
                password_hash: "h".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RepoError::Constraint(_)));
    }

    #[tokio::test]
    async fn recipe_foreign_keys_are_checked() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "a@x.com").await;
        let err = RecipeRepo::create(&store, bolo(user.id, 99)).await.unwrap_err();
        assert!(matches!(err, RepoError::Constraint(_)));
    }

    #[tokio::test]
    async fn owner_scope_filters_and_orders_latest_first() {
        let store = MemoryStore::new();
        let a = seed_user(&store, "a@x.com").await;
        let b = seed_user(&store, "b@x.com").await;
        let cat = CategoryRepo::create(&store, "Doces".into()).await.unwrap();
        let first = RecipeRepo::create(&store, bolo(a.id, cat.id)).await.unwrap();
        RecipeRepo::create(&store, bolo(b.id, cat.id)).await.unwrap();
        let second = RecipeRepo::create(&store, bolo(a.id, cat.id)).await.unwrap();

        let page = RecipeRepo::paginate(&store, RecipeScope::OwnerScoped(a.id), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.data[0].id, second.id);
        assert_eq!(page.data[1].id, first.id);

        let all = RecipeRepo::paginate(&store, RecipeScope::Global, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(all.total, 3);
    }

    #[tokio::test]
    async fn partial_update_keeps_other_fields() {
        let store = MemoryStore::new();
        let a = seed_user(&store, "a@x.com").await;
        let cat = CategoryRepo::create(&store, "Doces".into()).await.unwrap();
        let created = RecipeRepo::create(&store, bolo(a.id, cat.id)).await.unwrap();

        let updated = RecipeRepo::update(
            &store,
            created.id,
            RecipeChanges {
                portion: Some(4),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(updated.portion, Some(4));
        assert_eq!(updated.name, created.name);
        assert_eq!(updated.ingredients, created.ingredients);
        assert_eq!(updated.preparation_mode, created.preparation_mode);
        assert_eq!(updated.user_id, created.user_id);

        assert!(RecipeRepo::update(&store, 404, RecipeChanges::default())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn user_delete_cascades_and_category_delete_restricts() {
        let store = MemoryStore::new();
        let a = seed_user(&store, "a@x.com").await;
        let cat = CategoryRepo::create(&store, "Doces".into()).await.unwrap();
        let recipe = RecipeRepo::create(&store, bolo(a.id, cat.id)).await.unwrap();

        assert!(CategoryRepo::delete(&store, cat.id).await.is_err());
        assert!(UserRepo::delete(&store, a.id).await.unwrap());
        assert!(RecipeRepo::find(&store, recipe.id).await.unwrap().is_none());
        assert!(CategoryRepo::delete(&store, cat.id).await.unwrap());
        assert!(!CategoryRepo::delete(&store, cat.id).await.unwrap());
    }

    #[tokio::test]
    async fn expired_tokens_are_purged() {
        let store = MemoryStore::new();
        let a = seed_user(&store, "a@x.com").await;
        let now = OffsetDateTime::now_utc();
        let old = Uuid::new_v4();
        let fresh = Uuid::new_v4();
        store.insert(old, a.id, now - time::Duration::minutes(1)).await.unwrap();
        store.insert(fresh, a.id, now + time::Duration::minutes(1)).await.unwrap();

        assert_eq!(store.purge_expired(now).await.unwrap(), 1);
        assert!(TokenStore::find(&store, old).await.unwrap().is_none());
        assert!(TokenStore::find(&store, fresh).await.unwrap().is_some());
    }
}
