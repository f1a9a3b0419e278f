use serde::Deserialize;

use crate::error::{ApiError, FieldErrors};

const MAX_NAME_LEN: usize = 255;

/// Body of `POST /categories` and `PUT /categories/{id}`.
#[derive(Debug, Default, Deserialize)]
pub struct CategoryRequest {
    pub name: Option<String>,
}

impl CategoryRequest {
    pub fn validate_create(self) -> Result<String, ApiError> {
        match self.check(true)? {
            Some(name) => Ok(name),
            None => Err(ApiError::Validation(FieldErrors::new())),
        }
    }

    /// A missing name keeps the stored one.
    pub fn validate_update(self) -> Result<Option<String>, ApiError> {
        self.check(false)
    }

    fn check(self, required: bool) -> Result<Option<String>, ApiError> {
        let name = self.name.map(|n| n.trim().to_string());
        let mut errors = FieldErrors::new();
        match &name {
            None if required => errors.add("name", "O campo nome é obrigatório."),
            Some(n) if n.is_empty() => errors.add("name", "O campo nome é obrigatório."),
            Some(n) if n.chars().count() > MAX_NAME_LEN => {
                errors.add("name", "O campo nome não pode ter mais de 255 caracteres.")
            }
            _ => {}
        }
        errors.into_result()?;
        Ok(name)
    }
}
