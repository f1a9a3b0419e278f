use std::collections::BTreeMap;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::db::RepoError;

/// Field name -> messages, rendered as the `errors` object of a 422 body.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// `Ok(())` when nothing was collected, otherwise a validation error.
    pub fn into_result(self) -> Result<(), ApiError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Os dados fornecidos são inválidos.")]
    Validation(FieldErrors),

    #[error("Unauthenticated.")]
    Unauthenticated,

    #[error("Credenciais inválidas!")]
    InvalidCredentials,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(&'static str),

    /// Body, path or query string that could not be parsed; `detail` is the extractor's text.
    #[error("{message}")]
    Malformed {
        status: StatusCode,
        message: &'static str,
        detail: String,
    },

    #[error("Muitas tentativas. Aguarde alguns segundos.")]
    RateLimited { retry_after: u64 },

    /// Storage failure; `message` is what the caller sees, the source is attached as `error`.
    #[error("{message}")]
    Persistence {
        message: &'static str,
        #[source]
        source: RepoError,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Adapter for `map_err` on gateway results.
    pub fn persistence(message: &'static str) -> impl FnOnce(RepoError) -> ApiError {
        move |source| ApiError::Persistence { message, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Unauthenticated | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Malformed { status, .. } => *status,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Persistence { .. } | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        match self {
            ApiError::Validation(errors) => {
                (status, Json(json!({ "message": message, "errors": errors.0 }))).into_response()
            }
            ApiError::RateLimited { retry_after } => {
                let mut res = (
                    status,
                    Json(json!({ "message": message, "retry_after": retry_after })),
                )
                    .into_response();
                res.headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
                res
            }
            ApiError::Malformed { detail, .. } => {
                (status, Json(json!({ "message": message, "error": detail }))).into_response()
            }
            ApiError::Persistence { source, .. } => {
                error!(error = %source, retryable = source.is_retryable(), "{message}");
                (
                    status,
                    Json(json!({ "message": message, "error": source.to_string() })),
                )
                    .into_response()
            }
            ApiError::Internal(e) => {
                error!(error = ?e, "internal error");
                (
                    status,
                    Json(json!({ "message": "Erro interno do servidor.", "error": e.to_string() })),
                )
                    .into_response()
            }
            _ => (status, Json(json!({ "message": message }))).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_field_errors_pass() {
        assert!(FieldErrors::new().into_result().is_ok());
    }

    #[test]
    fn collected_field_errors_become_validation() {
        let mut errs = FieldErrors::new();
        errs.add("name", "O campo nome é obrigatório.");
        errs.add("name", "O campo nome não pode ter mais de 255 caracteres.");
        let err = errs.into_result().unwrap_err();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        match err {
            ApiError::Validation(f) => assert_eq!(f.0["name"].len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rate_limited_sets_retry_after_header() {
        let res = ApiError::RateLimited { retry_after: 42 }.into_response();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(res.headers()[header::RETRY_AFTER], "42");
    }

    #[test]
    fn statuses_follow_taxonomy() {
        assert_eq!(ApiError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::NotFound("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::Conflict("x").status(), StatusCode::CONFLICT);
        let p = ApiError::persistence("Erro ao criar a Receita.")(RepoError::Timeout);
        assert_eq!(p.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(p.to_string(), "Erro ao criar a Receita.");
    }
}
