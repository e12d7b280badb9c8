use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Recipe;

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct IngredientAmount {
    /// Ingredient id.
    pub id: Uuid,
    pub amount: i32,
}

/// Body of both recipe creation and recipe update; an update replaces the
/// recipe's tags and ingredient lines wholesale.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct RecipeWriteRequest {
    pub tags: Vec<Uuid>,
    pub ingredients: Vec<IngredientAmount>,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RecipeList {
    pub items: Vec<Recipe>,
}
