use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::users::SubscriptionList,
    error::AppResult,
    middleware::auth::{AuthUser, MaybeAuthUser},
    models::{Subscription, UserProfile},
    response::ApiResponse,
    routes::params::Pagination,
    services::{
        membership::{self, Follow},
        user_service,
    },
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/subscriptions", get(subscriptions))
        .route("/{id}", get(get_user))
        .route("/{id}/subscribe", post(subscribe).delete(unsubscribe))
}

#[utoipa::path(
    get,
    path = "/api/users/me",
    responses(
        (status = 200, description = "Current user", body = ApiResponse<UserProfile>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<UserProfile>>> {
    let resp = user_service::me(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User profile", body = ApiResponse<UserProfile>),
        (status = 404, description = "User not found")
    ),
    tag = "Users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    viewer: MaybeAuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<UserProfile>>> {
    let resp = user_service::get_user(&state, viewer.as_ref(), id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/users/subscriptions",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("limit" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "Authors the caller follows", body = ApiResponse<SubscriptionList>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Subscriptions"
)]
pub async fn subscriptions(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<SubscriptionList>>> {
    let resp = user_service::list_subscriptions(&state, &user, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/users/{id}/subscribe",
    params(
        ("id" = Uuid, Path, description = "Author ID")
    ),
    responses(
        (status = 201, description = "Subscribed", body = ApiResponse<Subscription>),
        (status = 400, description = "Already subscribed or subscribing to yourself"),
        (status = 404, description = "Author not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Subscriptions"
)]
pub async fn subscribe(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<ApiResponse<Subscription>>)> {
    let subscription = membership::add::<Follow>(&state, &user, id).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Subscribed", subscription, None)),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}/subscribe",
    params(
        ("id" = Uuid, Path, description = "Author ID")
    ),
    responses(
        (status = 204, description = "Unsubscribed"),
        (status = 404, description = "Subscription not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Subscriptions"
)]
pub async fn unsubscribe(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    membership::remove::<Follow>(&state, &user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
