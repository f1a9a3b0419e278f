use tracing::{info, warn};

use crate::{
    auth::{password::hash_password, services::AuthUser},
    db::{Page, PageRequest},
    error::{ApiError, FieldErrors},
    state::AppState,
};

use super::{
    dto::{CreateUserRequest, UpdateUserRequest},
    repo::{NewUser, User, UserChanges},
};

pub const NOT_FOUND: &str = "Usuário não encontrado.";
const NOT_SELF: &str = "Você só pode alterar a sua própria conta.";

/// Accounts are changed only by their holder; there are no admin roles.
fn ensure_self(caller: &AuthUser, id: i64) -> Result<(), ApiError> {
    if caller.id != id {
        warn!(user_id = caller.id, target = id, "account change denied");
        return Err(ApiError::Forbidden(NOT_SELF));
    }
    Ok(())
}

/// Emails must stay unique; `except` is the user being updated.
async fn ensure_email_free(st: &AppState, email: &str, except: Option<i64>) -> Result<(), ApiError> {
    let existing = st
        .bounded(st.users.find_by_email(email))
        .await
        .map_err(ApiError::persistence("Erro ao validar usuário."))?;
    match existing {
        Some(u) if Some(u.id) != except => {
            let mut errors = FieldErrors::new();
            errors.add("email", "O e-mail informado já está em uso.");
            Err(ApiError::Validation(errors))
        }
        _ => Ok(()),
    }
}

pub async fn list_users(st: &AppState, page: PageRequest) -> Result<Page<User>, ApiError> {
    st.bounded(st.users.paginate(page))
        .await
        .map_err(ApiError::persistence("Erro ao listar usuários."))
}

pub async fn create_user(st: &AppState, payload: CreateUserRequest) -> Result<User, ApiError> {
    let input = payload.validate()?;
    let (Some(name), Some(email), Some(plain)) = (input.name, input.email, input.password) else {
        return Err(ApiError::Validation(FieldErrors::new()));
    };
    ensure_email_free(st, &email, None).await?;

    let password_hash = hash_password(&plain)?;
    st.bounded(st.users.create(NewUser {
        name,
        email,
        password_hash,
    }))
    .await
    .map_err(ApiError::persistence("Erro ao criar usuário."))
}

pub async fn show_user(st: &AppState, id: i64) -> Result<User, ApiError> {
    st.bounded(st.users.find(id))
        .await
        .map_err(ApiError::persistence("Erro ao buscar usuário."))?
        .ok_or(ApiError::NotFound(NOT_FOUND))
}

pub async fn update_user(
    st: &AppState,
    caller: &AuthUser,
    id: i64,
    payload: UpdateUserRequest,
) -> Result<User, ApiError> {
    show_user(st, id).await?;
    ensure_self(caller, id)?;
    let input = payload.validate()?;
    if let Some(email) = &input.email {
        ensure_email_free(st, email, Some(id)).await?;
    }
    let password_hash = input.password.as_deref().map(hash_password).transpose()?;

    let changes = UserChanges {
        name: input.name,
        email: input.email,
        password_hash,
    };
    let user = st
        .bounded(st.users.update(id, changes))
        .await
        .map_err(ApiError::persistence("Erro ao atualizar usuário."))?
        .ok_or(ApiError::NotFound(NOT_FOUND))?;
    info!(user_id = user.id, "user updated");
    Ok(user)
}

/// Also removes the user's recipes and tokens.
pub async fn delete_user(st: &AppState, caller: &AuthUser, id: i64) -> Result<bool, ApiError> {
    match show_user(st, id).await {
        Ok(_) => {}
        Err(ApiError::NotFound(_)) => return Ok(false),
        Err(e) => return Err(e),
    }
    ensure_self(caller, id)?;
    let removed = st
        .bounded(st.users.delete(id))
        .await
        .map_err(ApiError::persistence("Erro ao deletar usuário."))?;
    if removed {
        info!(user_id = id, "user deleted");
    }
    Ok(removed)
}
