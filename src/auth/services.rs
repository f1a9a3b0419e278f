use axum::http::{header, HeaderMap};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    error::ApiError,
    state::AppState,
    users::{dto::CreateUserRequest, repo::User, services as users},
};

use super::{dto::LoginRequest, jwt::JwtKeys, password};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Identity behind a valid, unrevoked bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub token_id: Uuid,
}

/// Looks the user up by email and checks the password against its hash.
pub async fn verify_credentials(
    st: &AppState,
    email: &str,
    plain: &str,
) -> Result<Option<User>, ApiError> {
    let user = st
        .bounded(st.users.find_by_email(email))
        .await
        .map_err(ApiError::persistence("Erro ao autenticar."))?;

    let Some(user) = user else {
        password::burn_verification(plain);
        return Ok(None);
    };
    if password::verify_password(plain, &user.password_hash)? {
        Ok(Some(user))
    } else {
        Ok(None)
    }
}

/// Signs a token for `user_id` and records it so it can later be revoked.
pub async fn issue_token(st: &AppState, user_id: i64) -> Result<String, ApiError> {
    let signed = JwtKeys::from(&st.config.jwt).sign(user_id)?;
    st.bounded(st.tokens.insert(signed.jti, user_id, signed.expires_at))
        .await
        .map_err(ApiError::persistence("Erro ao gerar o token."))?;
    Ok(signed.token)
}

pub async fn authenticate(st: &AppState, token: &str) -> Result<AuthUser, ApiError> {
    let claims = JwtKeys::from(&st.config.jwt).verify(token).map_err(|e| {
        debug!(error = %e, "invalid or expired token");
        ApiError::Unauthenticated
    })?;

    let stored = st
        .bounded(st.tokens.find(claims.jti))
        .await
        .map_err(ApiError::persistence("Erro ao validar o token."))?;
    match stored {
        Some(t) if t.user_id == claims.sub => Ok(AuthUser {
            id: claims.sub,
            token_id: claims.jti,
        }),
        _ => {
            debug!(jti = %claims.jti, "token revoked or unknown");
            Err(ApiError::Unauthenticated)
        }
    }
}

/// Reads `Authorization: Bearer <token>` and authenticates it.
pub async fn authenticate_header(st: &AppState, headers: &HeaderMap) -> Result<AuthUser, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthenticated)?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .ok_or(ApiError::Unauthenticated)?;
    authenticate(st, token.trim()).await
}

pub async fn login(st: &AppState, payload: LoginRequest) -> Result<String, ApiError> {
    let (email, plain) = payload.into_credentials()?;
    let Some(user) = verify_credentials(st, &email, &plain).await? else {
        warn!(email = %email, "login rejected");
        return Err(ApiError::InvalidCredentials);
    };
    let token = issue_token(st, user.id).await?;
    info!(user_id = user.id, email = %user.email, "user logged in");
    Ok(token)
}

/// Revokes only the token used for this request.
pub async fn logout(st: &AppState, user: AuthUser) -> Result<(), ApiError> {
    st.bounded(st.tokens.revoke(user.token_id))
        .await
        .map_err(ApiError::persistence("Erro ao encerrar a sessão."))?;
    info!(user_id = user.id, jti = %user.token_id, "user logged out");
    Ok(())
}

pub async fn register(st: &AppState, payload: CreateUserRequest) -> Result<User, ApiError> {
    let user = users::create_user(st, payload).await?;
    info!(user_id = user.id, email = %user.email, "user registered");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn registered(st: &AppState) -> User {
        register(
            st,
            CreateUserRequest {
                name: Some("Ana".into()),
                email: Some("a@x.com".into()),
                password: Some("12345678".into()),
            },
        )
        .await
        .expect("register")
    }

    fn creds(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    #[test]
    fn email_regex() {
        assert!(is_valid_email("a@x.com"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("a x@y.com"));
    }

    #[tokio::test]
    async fn login_then_logout_revokes_token() {
        let st = AppState::fake();
        let user = registered(&st).await;

        let token = login(&st, creds("a@x.com", "12345678")).await.unwrap();
        let auth = authenticate(&st, &token).await.unwrap();
        assert_eq!(auth.id, user.id);

        logout(&st, auth).await.unwrap();
        assert!(matches!(
            authenticate(&st, &token).await,
            Err(ApiError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn logout_leaves_other_sessions_alone() {
        let st = AppState::fake();
        registered(&st).await;
        let first = login(&st, creds("a@x.com", "12345678")).await.unwrap();
        let second = login(&st, creds("a@x.com", "12345678")).await.unwrap();

        let auth = authenticate(&st, &first).await.unwrap();
        logout(&st, auth).await.unwrap();
        assert!(authenticate(&st, &second).await.is_ok());
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let st = AppState::fake();
        registered(&st).await;
        let wrong = login(&st, creds("a@x.com", "nope-nope")).await.unwrap_err();
        let unknown = login(&st, creds("b@x.com", "12345678")).await.unwrap_err();
        assert_eq!(wrong.to_string(), unknown.to_string());
        assert!(matches!(wrong, ApiError::InvalidCredentials));
        assert!(matches!(unknown, ApiError::InvalidCredentials));
    }

    #[tokio::test]
    async fn header_must_be_bearer() {
        let st = AppState::fake();
        let mut headers = HeaderMap::new();
        assert!(authenticate_header(&st, &headers).await.is_err());
        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert!(authenticate_header(&st, &headers).await.is_err());
    }
}
