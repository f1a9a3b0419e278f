use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use super::services::{authenticate_header, AuthUser};
use crate::{error::ApiError, state::AppState};

/// Rejects with 401 unless the request carries a valid, unrevoked bearer token.
#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        authenticate_header(state, &parts.headers).await
    }
}
