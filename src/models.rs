use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub email: String,
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub color: Option<String>,
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Ingredient {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
}

/// Ingredient line as shown inside a recipe; `id` is the ingredient id.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecipeIngredient {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Recipe {
    pub id: Uuid,
    pub tags: Vec<Tag>,
    pub author: UserProfile,
    pub ingredients: Vec<RecipeIngredient>,
    pub is_favorited: Option<bool>,
    pub is_in_shopping_cart: Option<bool>,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

/// Short recipe card returned by favorite and shopping cart toggles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RecipeSummary {
    pub id: Uuid,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Subscription {
    pub email: String,
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
    pub recipes: Vec<RecipeSummary>,
    pub recipes_count: i64,
}
