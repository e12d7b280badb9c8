use std::collections::HashMap;

use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use uuid::Uuid;

use crate::{
    dto::users::SubscriptionList,
    entity::{Follows, Recipes, Users, follows, recipes, users},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{RecipeSummary, Subscription, UserProfile},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::{
        membership::{self, Follow},
        recipe_service::recipe_summary,
    },
    state::AppState,
};

pub fn user_profile(model: users::Model, is_subscribed: bool) -> UserProfile {
    UserProfile {
        email: model.email,
        id: model.id,
        username: model.username,
        first_name: model.first_name,
        last_name: model.last_name,
        is_subscribed,
    }
}

pub async fn find_user(conn: &DatabaseConnection, id: Uuid) -> AppResult<users::Model> {
    Users::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)
}

fn subscription(profile: UserProfile, recipes: Vec<RecipeSummary>) -> Subscription {
    Subscription {
        email: profile.email,
        id: profile.id,
        username: profile.username,
        first_name: profile.first_name,
        last_name: profile.last_name,
        is_subscribed: profile.is_subscribed,
        recipes_count: recipes.len() as i64,
        recipes,
    }
}

async fn is_subscribed(
    conn: &DatabaseConnection,
    viewer: Option<&AuthUser>,
    author_id: Uuid,
) -> AppResult<bool> {
    match viewer {
        Some(viewer) if viewer.user_id != author_id => {
            membership::exists::<Follow>(conn, viewer.user_id, author_id).await
        }
        _ => Ok(false),
    }
}

/// Subscription card for one author: profile, all of their recipes and the
/// recipe count.
pub async fn subscription_for(
    conn: &DatabaseConnection,
    viewer: Option<&AuthUser>,
    author: users::Model,
) -> AppResult<Subscription> {
    let is_subscribed = is_subscribed(conn, viewer, author.id).await?;
    let recipes: Vec<_> = Recipes::find()
        .filter(recipes::Column::AuthorId.eq(author.id))
        .order_by_desc(recipes::Column::CreatedAt)
        .all(conn)
        .await?
        .into_iter()
        .map(recipe_summary)
        .collect();

    Ok(subscription(user_profile(author, is_subscribed), recipes))
}

pub async fn me(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<UserProfile>> {
    let model = find_user(&state.orm, user.user_id).await?;
    Ok(ApiResponse::success("OK", user_profile(model, false), None))
}

pub async fn get_user(
    state: &AppState,
    viewer: Option<&AuthUser>,
    id: Uuid,
) -> AppResult<ApiResponse<UserProfile>> {
    let model = find_user(&state.orm, id).await?;
    let subscribed = is_subscribed(&state.orm, viewer, id).await?;
    Ok(ApiResponse::success("OK", user_profile(model, subscribed), None))
}

pub async fn list_subscriptions(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<SubscriptionList>> {
    let (page, limit, offset) = pagination.normalize();

    let finder = Follows::find()
        .filter(follows::Column::UserId.eq(user.user_id))
        .filter(follows::Column::FollowingId.is_not_null())
        .order_by_desc(follows::Column::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let author_ids: Vec<Uuid> = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .filter_map(|row| row.following_id)
        .collect();

    let mut authors: HashMap<Uuid, users::Model> = Users::find()
        .filter(users::Column::Id.is_in(author_ids.clone()))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|author| (author.id, author))
        .collect();

    let mut recipes_by_author: HashMap<Uuid, Vec<recipes::Model>> = HashMap::new();
    for recipe in Recipes::find()
        .filter(recipes::Column::AuthorId.is_in(author_ids.clone()))
        .order_by_desc(recipes::Column::CreatedAt)
        .all(&state.orm)
        .await?
    {
        recipes_by_author
            .entry(recipe.author_id)
            .or_default()
            .push(recipe);
    }

    let items = author_ids
        .into_iter()
        .filter_map(|id| authors.remove(&id))
        .map(|author| {
            let recipes: Vec<_> = recipes_by_author
                .remove(&author.id)
                .unwrap_or_default()
                .into_iter()
                .map(recipe_summary)
                .collect();
            subscription(user_profile(author, true), recipes)
        })
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Subscriptions",
        SubscriptionList { items },
        Some(meta),
    ))
}
