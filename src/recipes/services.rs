use tracing::{info, warn};

use crate::{
    auth::services::AuthUser,
    db::{Page, PageRequest},
    error::{ApiError, FieldErrors},
    state::AppState,
};

use super::{
    dto::{PrintableRecipe, PublicRecipe, RecipeRequest},
    repo::{NewRecipe, Recipe, RecipeScope},
};

pub const NOT_FOUND: &str = "Receita não encontrada.";
const NOT_OWNER: &str = "Esta receita pertence a outro usuário.";

async fn ensure_category(st: &AppState, id: i64, errors: &mut FieldErrors) -> Result<(), ApiError> {
    let found = st
        .bounded(st.categories.find(id))
        .await
        .map_err(ApiError::persistence("Erro ao validar categoria."))?;
    if found.is_none() {
        errors.add("category_id", "A categoria selecionada é inválida.");
    }
    Ok(())
}

/// Loads the recipe and checks that `caller` owns it.
async fn owned_by(st: &AppState, id: i64, caller: &AuthUser) -> Result<Recipe, ApiError> {
    let recipe = show_recipe(st, id).await?;
    if recipe.user_id != caller.id {
        warn!(recipe_id = id, user_id = caller.id, owner = recipe.user_id, "recipe ownership denied");
        return Err(ApiError::Forbidden(NOT_OWNER));
    }
    Ok(recipe)
}

pub async fn list_recipes(
    st: &AppState,
    scope: RecipeScope,
    page: PageRequest,
) -> Result<Page<Recipe>, ApiError> {
    st.bounded(st.recipes.paginate(scope, page))
        .await
        .map_err(ApiError::persistence("Erro ao listar receitas."))
}

pub async fn list_public(st: &AppState, page: PageRequest) -> Result<Page<PublicRecipe>, ApiError> {
    Ok(list_recipes(st, RecipeScope::Global, page).await?.map(PublicRecipe::from))
}

pub async fn create_recipe(
    st: &AppState,
    caller: &AuthUser,
    payload: RecipeRequest,
) -> Result<Recipe, ApiError> {
    let mut errors = FieldErrors::new();
    let fields = payload.check(true, &mut errors);
    if let Some(category_id) = fields.category_id {
        ensure_category(st, category_id, &mut errors).await?;
    }
    errors.into_result()?;
    let (Some(name), Some(category_id)) = (fields.name, fields.category_id) else {
        return Err(ApiError::Validation(FieldErrors::new()));
    };

    let recipe = st
        .bounded(st.recipes.create(NewRecipe {
            name,
            user_id: caller.id,
            category_id,
            preparation_time: fields.preparation_time,
            portion: fields.portion,
            preparation_mode: fields.preparation_mode,
            ingredients: fields.ingredients,
        }))
        .await
        .map_err(ApiError::persistence("Erro ao criar a receita."))?;
    info!(recipe_id = recipe.id, user_id = caller.id, "recipe created");
    Ok(recipe)
}

pub async fn show_recipe(st: &AppState, id: i64) -> Result<Recipe, ApiError> {
    st.bounded(st.recipes.find(id))
        .await
        .map_err(ApiError::persistence("Erro ao buscar receita."))?
        .ok_or(ApiError::NotFound(NOT_FOUND))
}

pub async fn print_recipe(st: &AppState, id: i64) -> Result<PrintableRecipe, ApiError> {
    show_recipe(st, id).await.map(PrintableRecipe::from)
}

pub async fn update_recipe(
    st: &AppState,
    caller: &AuthUser,
    id: i64,
    payload: RecipeRequest,
) -> Result<Recipe, ApiError> {
    owned_by(st, id, caller).await?;

    let mut errors = FieldErrors::new();
    let changes = payload.check(false, &mut errors);
    if let Some(category_id) = changes.category_id {
        ensure_category(st, category_id, &mut errors).await?;
    }
    errors.into_result()?;

    st.bounded(st.recipes.update(id, changes))
        .await
        .map_err(ApiError::persistence("Erro ao atualizar receita."))?
        .ok_or(ApiError::NotFound(NOT_FOUND))
}

pub async fn delete_recipe(st: &AppState, caller: &AuthUser, id: i64) -> Result<bool, ApiError> {
    match owned_by(st, id, caller).await {
        Ok(_) => {}
        Err(ApiError::NotFound(_)) => return Ok(false),
        Err(e) => return Err(e),
    }
    let removed = st
        .bounded(st.recipes.delete(id))
        .await
        .map_err(ApiError::persistence("Erro ao deletar receita."))?;
    if removed {
        info!(recipe_id = id, user_id = caller.id, "recipe deleted");
    }
    Ok(removed)
}
