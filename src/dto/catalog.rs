use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Ingredient, Tag};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct IngredientQuery {
    /// Case-insensitive search; prefix matches are listed first.
    pub name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct IngredientList {
    #[schema(value_type = Vec<Ingredient>)]
    pub items: Vec<Ingredient>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct TagList {
    #[schema(value_type = Vec<Tag>)]
    pub items: Vec<Tag>,
}
