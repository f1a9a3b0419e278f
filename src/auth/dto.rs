use serde::{Deserialize, Serialize};

use crate::error::{ApiError, FieldErrors};

use super::services::is_valid_email;

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl LoginRequest {
    /// Returns the `(email, password)` pair once both are present and well formed.
    pub fn into_credentials(self) -> Result<(String, String), ApiError> {
        let mut errors = FieldErrors::new();
        let email = self
            .email
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty());
        match &email {
            None => errors.add("email", "O campo email é obrigatório."),
            Some(e) if !is_valid_email(e) => {
                errors.add("email", "O campo email deve ser um endereço de e-mail válido.")
            }
            _ => {}
        }
        let password = self.password.filter(|p| !p.is_empty());
        if password.is_none() {
            errors.add("password", "O campo senha é obrigatório.");
        }
        errors.into_result()?;
        match (email, password) {
            (Some(email), Some(password)) => Ok((email, password)),
            _ => Err(ApiError::Validation(FieldErrors::new())),
        }
    }
}

/// Response returned after login.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}
