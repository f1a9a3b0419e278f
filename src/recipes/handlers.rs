use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::services::AuthUser,
    db::{Page, Pagination},
    dto::{DataResponse, MessageResponse},
    error::ApiError,
    extract::{ApiJson, ApiPath, ApiQuery},
    state::AppState,
    throttle::store_throttle,
};

use super::{
    dto::{PrintableRecipe, PublicRecipe, RecipeRequest},
    repo::{Recipe, RecipeScope},
    services,
};

/// No bearer token needed.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/list_recipes", get(list_public))
        .route("/recipes/:id/print", get(print_recipe))
}

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes))
        .route("/recipes/:id", get(show_recipe))
}

pub fn write_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/recipes", post(create_recipe))
        .route("/recipes/:id", put(update_recipe).delete(delete_recipe))
        .route_layer(middleware::from_fn_with_state(state, store_throttle))
}

#[instrument(skip(state))]
pub async fn list_public(
    State(state): State<AppState>,
    ApiQuery(p): ApiQuery<Pagination>,
) -> Result<Json<Page<PublicRecipe>>, ApiError> {
    Ok(Json(services::list_public(&state, p.into()).await?))
}

#[instrument(skip(state))]
pub async fn print_recipe(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<PrintableRecipe>, ApiError> {
    Ok(Json(services::print_recipe(&state, id).await?))
}

/// The caller's own recipes, newest first.
#[instrument(skip(state))]
pub async fn list_recipes(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(p): ApiQuery<Pagination>,
) -> Result<Json<Page<Recipe>>, ApiError> {
    let scope = RecipeScope::OwnerScoped(user.id);
    Ok(Json(services::list_recipes(&state, scope, p.into()).await?))
}

#[instrument(skip(state))]
pub async fn show_recipe(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Recipe>, ApiError> {
    Ok(Json(services::show_recipe(&state, id).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_recipe(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(payload): ApiJson<RecipeRequest>,
) -> Result<(StatusCode, Json<DataResponse<Recipe>>), ApiError> {
    let recipe = services::create_recipe(&state, &user, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse::new("Receita cadastrada com sucesso.", recipe)),
    ))
}

#[instrument(skip(state, payload))]
pub async fn update_recipe(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<RecipeRequest>,
) -> Result<Json<DataResponse<Recipe>>, ApiError> {
    let recipe = services::update_recipe(&state, &user, id, payload).await?;
    Ok(Json(DataResponse::new("Receita atualizada com sucesso.", recipe)))
}

#[instrument(skip(state))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    if services::delete_recipe(&state, &user, id).await? {
        Ok(Json(MessageResponse::new("Receita deletada com sucesso.")))
    } else {
        Err(ApiError::NotFound(services::NOT_FOUND))
    }
}
