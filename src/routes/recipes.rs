use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderName, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::{Query, QueryRejection};
use uuid::Uuid;

use crate::{
    dto::recipes::{RecipeList, RecipeWriteRequest},
    error::AppResult,
    middleware::auth::{AuthUser, MaybeAuthUser},
    models::{Recipe, RecipeSummary},
    response::ApiResponse,
    routes::params::RecipeQuery,
    services::{
        membership::{self, CartEntry, Favorite},
        recipe_service,
        shopping_list::{self, SHOPPING_LIST_FILENAME},
    },
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_recipes).post(create_recipe))
        .route("/download_shopping_cart", get(download_shopping_cart))
        .route(
            "/{id}",
            get(get_recipe).patch(update_recipe).delete(delete_recipe),
        )
        .route(
            "/{id}/favorite",
            post(add_favorite).delete(remove_favorite),
        )
        .route(
            "/{id}/shopping_cart",
            post(add_to_shopping_cart).delete(remove_from_shopping_cart),
        )
}

#[utoipa::path(
    get,
    path = "/api/recipes",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("limit" = Option<i64>, Query, description = "Items per page, default 20"),
        ("author" = Option<Uuid>, Query, description = "Only recipes of this author"),
        ("tags" = Option<Vec<String>>, Query, description = "Tag slugs, repeated or comma-separated"),
        ("is_favorited" = Option<bool>, Query, description = "Only the caller's favorites"),
        ("is_in_shopping_cart" = Option<bool>, Query, description = "Only recipes in the caller's cart")
    ),
    responses(
        (status = 200, description = "List recipes", body = ApiResponse<RecipeList>),
        (status = 401, description = "Invalid token")
    ),
    tag = "Recipes"
)]
pub async fn list_recipes(
    State(state): State<AppState>,
    viewer: MaybeAuthUser,
    query: Result<Query<RecipeQuery>, QueryRejection>,
) -> AppResult<Json<ApiResponse<RecipeList>>> {
    let Query(query) = query?;
    let resp = recipe_service::list_recipes(&state, viewer.as_ref(), query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/recipes/{id}",
    params(
        ("id" = Uuid, Path, description = "Recipe ID")
    ),
    responses(
        (status = 200, description = "Get recipe", body = ApiResponse<Recipe>),
        (status = 404, description = "Recipe not found")
    ),
    tag = "Recipes"
)]
pub async fn get_recipe(
    State(state): State<AppState>,
    viewer: MaybeAuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Recipe>>> {
    let resp = recipe_service::get_recipe(&state, viewer.as_ref(), id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/recipes",
    request_body = RecipeWriteRequest,
    responses(
        (status = 201, description = "Recipe created", body = ApiResponse<Recipe>),
        (status = 400, description = "Invalid recipe"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Recipes"
)]
pub async fn create_recipe(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<RecipeWriteRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Recipe>>)> {
    let resp = recipe_service::create_recipe(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    patch,
    path = "/api/recipes/{id}",
    params(
        ("id" = Uuid, Path, description = "Recipe ID")
    ),
    request_body = RecipeWriteRequest,
    responses(
        (status = 200, description = "Recipe updated", body = ApiResponse<Recipe>),
        (status = 400, description = "Invalid recipe"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Recipe not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Recipes"
)]
pub async fn update_recipe(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RecipeWriteRequest>,
) -> AppResult<Json<ApiResponse<Recipe>>> {
    let resp = recipe_service::update_recipe(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/recipes/{id}",
    params(
        ("id" = Uuid, Path, description = "Recipe ID")
    ),
    responses(
        (status = 204, description = "Recipe deleted"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Recipe not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Recipes"
)]
pub async fn delete_recipe(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    recipe_service::delete_recipe(&state, &user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/recipes/{id}/favorite",
    params(
        ("id" = Uuid, Path, description = "Recipe ID")
    ),
    responses(
        (status = 201, description = "Added to favorites", body = ApiResponse<RecipeSummary>),
        (status = 400, description = "Already in favorites"),
        (status = 404, description = "Recipe not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Favorites"
)]
pub async fn add_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<ApiResponse<RecipeSummary>>)> {
    let summary = membership::add::<Favorite>(&state, &user, id).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Added to favorites", summary, None)),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/recipes/{id}/favorite",
    params(
        ("id" = Uuid, Path, description = "Recipe ID")
    ),
    responses(
        (status = 204, description = "Removed from favorites"),
        (status = 404, description = "Favorite not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Favorites"
)]
pub async fn remove_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    membership::remove::<Favorite>(&state, &user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/recipes/{id}/shopping_cart",
    params(
        ("id" = Uuid, Path, description = "Recipe ID")
    ),
    responses(
        (status = 201, description = "Added to shopping cart", body = ApiResponse<RecipeSummary>),
        (status = 400, description = "Already in shopping cart"),
        (status = 404, description = "Recipe not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Shopping cart"
)]
pub async fn add_to_shopping_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<ApiResponse<RecipeSummary>>)> {
    let summary = membership::add::<CartEntry>(&state, &user, id).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Added to shopping cart", summary, None)),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/recipes/{id}/shopping_cart",
    params(
        ("id" = Uuid, Path, description = "Recipe ID")
    ),
    responses(
        (status = 204, description = "Removed from shopping cart"),
        (status = 404, description = "Recipe is not in the shopping cart")
    ),
    security(("bearer_auth" = [])),
    tag = "Shopping cart"
)]
pub async fn remove_from_shopping_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    membership::remove::<CartEntry>(&state, &user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/recipes/download_shopping_cart",
    responses(
        (status = 200, description = "Consolidated shopping list", body = String, content_type = "text/plain"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Shopping cart"
)]
pub async fn download_shopping_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let body = shopping_list::build_shopping_list(&state, &user).await?;
    Ok((attachment_headers(SHOPPING_LIST_FILENAME), body))
}

/// Headers serving a plain-text body as a file download.
pub fn attachment_headers(filename: &str) -> [(HeaderName, String); 2] {
    [
        (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        ),
    ]
}
