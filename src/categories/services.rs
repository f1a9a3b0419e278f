use tracing::{info, warn};

use crate::{
    db::{Page, PageRequest},
    error::ApiError,
    state::AppState,
};

use super::{dto::CategoryRequest, repo::Category};

pub const NOT_FOUND: &str = "Categoria não encontrada.";

pub async fn list_categories(st: &AppState, page: PageRequest) -> Result<Page<Category>, ApiError> {
    st.bounded(st.categories.paginate(page))
        .await
        .map_err(ApiError::persistence("Erro ao listar categorias."))
}

pub async fn create_category(st: &AppState, payload: CategoryRequest) -> Result<Category, ApiError> {
    let name = payload.validate_create()?;
    let category = st
        .bounded(st.categories.create(name))
        .await
        .map_err(ApiError::persistence("Erro ao criar a categoria."))?;
    info!(category_id = category.id, "category created");
    Ok(category)
}

pub async fn show_category(st: &AppState, id: i64) -> Result<Category, ApiError> {
    st.bounded(st.categories.find(id))
        .await
        .map_err(ApiError::persistence("Erro ao buscar categoria."))?
        .ok_or(ApiError::NotFound(NOT_FOUND))
}

pub async fn update_category(
    st: &AppState,
    id: i64,
    payload: CategoryRequest,
) -> Result<Category, ApiError> {
    let name = payload.validate_update()?;
    st.bounded(st.categories.update(id, name))
        .await
        .map_err(ApiError::persistence("Erro ao atualizar categoria."))?
        .ok_or(ApiError::NotFound(NOT_FOUND))
}

/// Refuses while any recipe still points at the category.
pub async fn delete_category(st: &AppState, id: i64) -> Result<bool, ApiError> {
    let in_use = st
        .bounded(st.recipes.count_by_category(id))
        .await
        .map_err(ApiError::persistence("Erro ao deletar categoria."))?;
    if in_use > 0 {
        warn!(category_id = id, recipes = in_use, "category delete refused");
        return Err(ApiError::Conflict(
            "Categoria possui receitas vinculadas e não pode ser removida.",
        ));
    }
    st.bounded(st.categories.delete(id))
        .await
        .map_err(ApiError::persistence("Erro ao deletar categoria."))
}
