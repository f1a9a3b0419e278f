use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::FieldErrors;

use super::repo::{Recipe, RecipeChanges};

const MAX_NAME_LEN: usize = 255;

/// Body of `POST /recipes` and `PUT /recipes/{id}`.
///
/// Unknown keys, `user_id` included, are dropped by serde: the owner always
/// comes from the bearer token.
#[derive(Debug, Default, Deserialize)]
pub struct RecipeRequest {
    pub name: Option<String>,
    pub category_id: Option<i64>,
    pub preparation_time: Option<i64>,
    pub portion: Option<i64>,
    pub preparation_mode: Option<String>,
    pub ingredients: Option<String>,
}

fn positive(field: &'static str, value: Option<i64>, errors: &mut FieldErrors) -> Option<i32> {
    let v = value?;
    match i32::try_from(v) {
        Ok(n) if n >= 1 => Some(n),
        _ => {
            errors.add(field, format!("O campo {field} deve ser no mínimo 1."));
            None
        }
    }
}

impl RecipeRequest {
    /// Field checks that need no storage. `required` is true on create.
    /// Whether `category_id` exists is checked by the caller.
    pub fn check(self, required: bool, errors: &mut FieldErrors) -> RecipeChanges {
        let name = self.name.map(|n| n.trim().to_string());
        match &name {
            None if required => errors.add("name", "O campo nome é obrigatório."),
            Some(n) if n.is_empty() => errors.add("name", "O campo nome é obrigatório."),
            Some(n) if n.chars().count() > MAX_NAME_LEN => {
                errors.add("name", "O campo nome não pode ter mais de 255 caracteres.")
            }
            _ => {}
        }
        if required && self.category_id.is_none() {
            errors.add("category_id", "O campo categoria é obrigatório.");
        }

        RecipeChanges {
            name,
            category_id: self.category_id,
            preparation_time: positive("preparation_time", self.preparation_time, errors),
            portion: positive("portion", self.portion, errors),
            preparation_mode: self.preparation_mode,
            ingredients: self.ingredients,
        }
    }
}

/// Row of the public `/list_recipes` listing.
#[derive(Debug, Serialize, PartialEq)]
pub struct PublicRecipe {
    pub id: i64,
    pub name: String,
    pub preparation_time: Option<i32>,
    pub portion: Option<i32>,
    pub ingredients: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Recipe> for PublicRecipe {
    fn from(r: Recipe) -> Self {
        Self {
            id: r.id,
            name: r.name,
            preparation_time: r.preparation_time,
            portion: r.portion,
            ingredients: r.ingredients,
            created_at: r.created_at,
        }
    }
}

/// What `/recipes/{id}/print` renders: the cooking content, no ownership data.
#[derive(Debug, Serialize, PartialEq)]
pub struct PrintableRecipe {
    pub id: i64,
    pub name: String,
    pub preparation_time: Option<i32>,
    pub portion: Option<i32>,
    pub preparation_mode: Option<String>,
    pub ingredients: Option<String>,
}

impl From<Recipe> for PrintableRecipe {
    fn from(r: Recipe) -> Self {
        Self {
            id: r.id,
            name: r.name,
            preparation_time: r.preparation_time,
            portion: r.portion,
            preparation_mode: r.preparation_mode,
            ingredients: r.ingredients,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_requires_name_and_category() {
        let mut errors = FieldErrors::new();
        RecipeRequest::default().check(true, &mut errors);
        assert!(errors.contains("name"));
        assert!(errors.contains("category_id"));

        let mut errors = FieldErrors::new();
        RecipeRequest::default().check(false, &mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn counts_must_be_positive() {
        let mut errors = FieldErrors::new();
        let req = RecipeRequest {
            portion: Some(0),
            preparation_time: Some(i64::from(i32::MAX) + 1),
            ..Default::default()
        };
        let changes = req.check(false, &mut errors);
        assert!(errors.contains("portion"));
        assert!(errors.contains("preparation_time"));
        assert_eq!(changes.portion, None);
    }

    #[test]
    fn body_user_id_is_ignored() {
        let req: RecipeRequest =
            serde_json::from_str(r#"{"name":"Bolo","category_id":1,"user_id":99}"#).unwrap();
        let mut errors = FieldErrors::new();
        let changes = req.check(true, &mut errors);
        assert!(errors.is_empty());
        assert_eq!(changes.name.as_deref(), Some("Bolo"));
        assert_eq!(changes.category_id, Some(1));
    }
}
