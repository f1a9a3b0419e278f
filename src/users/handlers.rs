use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
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
};

use super::{
    dto::{CreateUserRequest, UpdateUserRequest},
    repo::User,
    services,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(show_user).put(update_user).delete(delete_user),
        )
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiQuery(p): ApiQuery<Pagination>,
) -> Result<Json<Page<User>>, ApiError> {
    let page = services::list_users(&state, p.into()).await?;
    Ok(Json(page))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiJson(payload): ApiJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<DataResponse<User>>), ApiError> {
    let user = services::create_user(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse::new("Usuário cadastrado com sucesso.", user)),
    ))
}

#[instrument(skip(state))]
pub async fn show_user(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(services::show_user(&state, id).await?))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<UpdateUserRequest>,
) -> Result<Json<DataResponse<User>>, ApiError> {
    let user = services::update_user(&state, &caller, id, payload).await?;
    Ok(Json(DataResponse::new("Usuário atualizado com sucesso.", user)))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    if services::delete_user(&state, &caller, id).await? {
        Ok(Json(MessageResponse::new("Usuário deletado com sucesso.")))
    } else {
        Err(ApiError::NotFound(services::NOT_FOUND))
    }
}
