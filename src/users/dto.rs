use serde::Deserialize;

use crate::{
    auth::{password::MIN_PASSWORD_LEN, services::is_valid_email},
    error::{ApiError, FieldErrors},
};

pub const MAX_NAME_LEN: usize = 255;

/// Body of `POST /register` and `POST /users`.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Body of `PUT /users/{id}`; every field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Validated, normalized user fields; `password` is still plain text.
#[derive(Debug, Clone, PartialEq)]
pub struct UserInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

fn check_name(errors: &mut FieldErrors, name: &Option<String>, required: bool) {
    match name {
        None if required => errors.add("name", "O campo nome é obrigatório."),
        Some(n) if n.is_empty() => errors.add("name", "O campo nome é obrigatório."),
        Some(n) if n.chars().count() > MAX_NAME_LEN => {
            errors.add("name", "O campo nome não pode ter mais de 255 caracteres.")
        }
        _ => {}
    }
}

fn check_email(errors: &mut FieldErrors, email: &Option<String>, required: bool) {
    match email {
        None if required => errors.add("email", "O campo email é obrigatório."),
        Some(e) if !is_valid_email(e) => {
            errors.add("email", "O campo email deve ser um endereço de e-mail válido.")
        }
        _ => {}
    }
}

fn check_password(errors: &mut FieldErrors, password: &Option<String>, required: bool) {
    match password {
        None if required => errors.add("password", "O campo senha é obrigatório."),
        Some(p) if p.chars().count() < MIN_PASSWORD_LEN => {
            errors.add("password", "O campo senha deve ter pelo menos 8 caracteres.")
        }
        _ => {}
    }
}

fn normalize(name: Option<String>, email: Option<String>) -> (Option<String>, Option<String>) {
    (
        name.map(|n| n.trim().to_string()),
        email.map(|e| e.trim().to_lowercase()),
    )
}

impl CreateUserRequest {
    pub fn validate(self) -> Result<UserInput, ApiError> {
        let (name, email) = normalize(self.name, self.email);
        let mut errors = FieldErrors::new();
        check_name(&mut errors, &name, true);
        check_email(&mut errors, &email, true);
        check_password(&mut errors, &self.password, true);
        errors.into_result()?;
        Ok(UserInput {
            name,
            email,
            password: self.password,
        })
    }
}

impl UpdateUserRequest {
    pub fn validate(self) -> Result<UserInput, ApiError> {
        let (name, email) = normalize(self.name, self.email);
        let mut errors = FieldErrors::new();
        check_name(&mut errors, &name, false);
        check_email(&mut errors, &email, false);
        check_password(&mut errors, &self.password, false);
        errors.into_result()?;
        Ok(UserInput {
            name,
            email,
            password: self.password,
        })
    }
}
