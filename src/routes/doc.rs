use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse},
        catalog::{IngredientList, IngredientQuery, TagList},
        recipes::{IngredientAmount, RecipeList, RecipeWriteRequest},
        users::SubscriptionList,
    },
    models::{Ingredient, Recipe, RecipeIngredient, RecipeSummary, Subscription, Tag, UserProfile},
    response::{ApiResponse, Meta},
    routes::{auth, health, ingredients, params, recipes, tags, users},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        tags::list_tags,
        tags::get_tag,
        ingredients::list_ingredients,
        ingredients::get_ingredient,
        recipes::list_recipes,
        recipes::get_recipe,
        recipes::create_recipe,
        recipes::update_recipe,
        recipes::delete_recipe,
        recipes::add_favorite,
        recipes::remove_favorite,
        recipes::add_to_shopping_cart,
        recipes::remove_from_shopping_cart,
        recipes::download_shopping_cart,
        users::me,
        users::get_user,
        users::subscriptions,
        users::subscribe,
        users::unsubscribe
    ),
    components(
        schemas(
            UserProfile,
            Tag,
            Ingredient,
            RecipeIngredient,
            Recipe,
            RecipeSummary,
            Subscription,
            LoginRequest,
            LoginResponse,
            IngredientQuery,
            IngredientList,
            TagList,
            IngredientAmount,
            RecipeWriteRequest,
            RecipeList,
            SubscriptionList,
            params::Pagination,
            params::RecipeQuery,
            Meta,
            ApiResponse<Recipe>,
            ApiResponse<RecipeList>,
            ApiResponse<RecipeSummary>,
            ApiResponse<Subscription>,
            ApiResponse<SubscriptionList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Tags", description = "Tag catalog"),
        (name = "Ingredients", description = "Ingredient catalog"),
        (name = "Recipes", description = "Recipe endpoints"),
        (name = "Favorites", description = "Favorite recipes"),
        (name = "Shopping cart", description = "Shopping cart and shopping list download"),
        (name = "Users", description = "User profiles"),
        (name = "Subscriptions", description = "Author subscriptions"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
