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

use super::{dto::CategoryRequest, repo::Category, services};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/categories/:id", get(show_category))
}

/// Mutating routes share the `store-actions` limiter.
pub fn write_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/categories", post(create_category))
        .route("/categories/:id", put(update_category).delete(delete_category))
        .route_layer(middleware::from_fn_with_state(state, store_throttle))
}

#[instrument(skip(state))]
pub async fn list_categories(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiQuery(p): ApiQuery<Pagination>,
) -> Result<Json<Page<Category>>, ApiError> {
    Ok(Json(services::list_categories(&state, p.into()).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_category(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiJson(payload): ApiJson<CategoryRequest>,
) -> Result<(StatusCode, Json<DataResponse<Category>>), ApiError> {
    let category = services::create_category(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse::new("Categoria cadastrada com sucesso.", category)),
    ))
}

#[instrument(skip(state))]
pub async fn show_category(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(services::show_category(&state, id).await?))
}

#[instrument(skip(state, payload))]
pub async fn update_category(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<CategoryRequest>,
) -> Result<Json<DataResponse<Category>>, ApiError> {
    let category = services::update_category(&state, id, payload).await?;
    Ok(Json(DataResponse::new("Categoria atualizada com sucesso.", category)))
}

#[instrument(skip(state))]
pub async fn delete_category(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    if services::delete_category(&state, id).await? {
        Ok(Json(MessageResponse::new("Categoria deletada com sucesso.")))
    } else {
        Err(ApiError::NotFound(services::NOT_FOUND))
    }
}
