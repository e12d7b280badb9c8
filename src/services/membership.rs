//! Add/remove of unique `(user, target)` relationship rows.
//!
//! Favorites, shopping cart entries and author subscriptions share one flow;
//! each [`MembershipKind`] only says where its rows live, how to load the
//! target and what to answer with.

use std::future::Future;

use sea_orm::{
    ActiveValue::NotSet, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, QueryFilter, Set,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    audit,
    entity::{Users, favorites, follows, recipes, shopping_cart, users},
    error::{AppError, AppResult, is_foreign_key_violation, is_unique_violation},
    middleware::auth::AuthUser,
    models::{RecipeSummary, Subscription},
    services::{recipe_service, user_service},
    state::AppState,
};

type ColumnOf<K> = <<K as MembershipKind>::Entity as EntityTrait>::Column;
type ActiveModelOf<K> = <<K as MembershipKind>::Entity as EntityTrait>::ActiveModel;

pub trait MembershipKind {
    type Entity: EntityTrait;
    type Target: Send;
    type Payload: Serialize + Send;

    /// Resource name used in audit records and logs.
    const RESOURCE: &'static str;
    const DUPLICATE_MESSAGE: &'static str;

    fn owner_column() -> ColumnOf<Self>;
    fn target_column() -> ColumnOf<Self>;
    fn new_record(user_id: Uuid, target_id: Uuid) -> ActiveModelOf<Self>;

    /// Checked before anything is read from the database.
    fn precondition(_user: &AuthUser, _target_id: Uuid) -> AppResult<()> {
        Ok(())
    }

    fn load_target(
        conn: &DatabaseConnection,
        target_id: Uuid,
    ) -> impl Future<Output = AppResult<Self::Target>> + Send;

    fn project(
        conn: &DatabaseConnection,
        viewer: &AuthUser,
        target: Self::Target,
    ) -> impl Future<Output = AppResult<Self::Payload>> + Send;
}

fn pair<K: MembershipKind>(user_id: Uuid, target_id: Uuid) -> Condition {
    Condition::all()
        .add(K::owner_column().eq(user_id))
        .add(K::target_column().eq(target_id))
}

pub async fn exists<K: MembershipKind>(
    conn: &DatabaseConnection,
    user_id: Uuid,
    target_id: Uuid,
) -> AppResult<bool> {
    let found = K::Entity::find()
        .filter(pair::<K>(user_id, target_id))
        .one(conn)
        .await?;
    Ok(found.is_some())
}

pub async fn add<K>(state: &AppState, user: &AuthUser, target_id: Uuid) -> AppResult<K::Payload>
where
    K: MembershipKind,
    <K::Entity as EntityTrait>::Model: IntoActiveModel<ActiveModelOf<K>>,
{
    K::precondition(user, target_id)?;
    let target = K::load_target(&state.orm, target_id).await?;

    if exists::<K>(&state.orm, user.user_id, target_id).await? {
        return Err(AppError::DuplicateMembership(K::DUPLICATE_MESSAGE.into()));
    }

    // A concurrent identical request can still win the race; the unique
    // index is what guarantees a single row.
    let inserted = K::Entity::insert(K::new_record(user.user_id, target_id))
        .exec_without_returning(&state.orm)
        .await;
    if let Err(err) = inserted {
        return Err(insert_error::<K>(&state.orm, user, err).await);
    }

    audit::record(
        &state.orm,
        user.user_id,
        &format!("{}_add", K::RESOURCE),
        K::RESOURCE,
        serde_json::json!({ "target_id": target_id }),
    )
    .await;
    tracing::debug!(user_id = %user.user_id, %target_id, resource = K::RESOURCE, "membership added");

    K::project(&state.orm, user, target).await
}

/// Maps a rejected insert: a duplicate pair, or a pair pointing at a row
/// deleted since it was looked up.
async fn insert_error<K: MembershipKind>(
    conn: &DatabaseConnection,
    user: &AuthUser,
    err: DbErr,
) -> AppError {
    if is_unique_violation(&err) {
        return AppError::DuplicateMembership(K::DUPLICATE_MESSAGE.into());
    }
    if !is_foreign_key_violation(&err) {
        return AppError::from(err);
    }

    match Users::find_by_id(user.user_id).one(conn).await {
        Ok(Some(_)) => AppError::NotFound,
        Ok(None) => AppError::Unauthorized("Account no longer exists".into()),
        Err(lookup) => AppError::from(lookup),
    }
}

pub async fn remove<K: MembershipKind>(
    state: &AppState,
    user: &AuthUser,
    target_id: Uuid,
) -> AppResult<()> {
    K::load_target(&state.orm, target_id).await?;

    let result = K::Entity::delete_many()
        .filter(pair::<K>(user.user_id, target_id))
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.orm,
        user.user_id,
        &format!("{}_remove", K::RESOURCE),
        K::RESOURCE,
        serde_json::json!({ "target_id": target_id }),
    )
    .await;
    tracing::debug!(user_id = %user.user_id, %target_id, resource = K::RESOURCE, "membership removed");

    Ok(())
}

pub struct Favorite;

impl MembershipKind for Favorite {
    type Entity = favorites::Entity;
    type Target = recipes::Model;
    type Payload = RecipeSummary;

    const RESOURCE: &'static str = "favorites";
    const DUPLICATE_MESSAGE: &'static str = "Recipe is already in favorites";

    fn owner_column() -> favorites::Column {
        favorites::Column::UserId
    }

    fn target_column() -> favorites::Column {
        favorites::Column::RecipeId
    }

    fn new_record(user_id: Uuid, target_id: Uuid) -> favorites::ActiveModel {
        favorites::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(Some(user_id)),
            recipe_id: Set(Some(target_id)),
            created_at: NotSet,
        }
    }

    async fn load_target(conn: &DatabaseConnection, target_id: Uuid) -> AppResult<recipes::Model> {
        recipe_service::find_recipe(conn, target_id).await
    }

    async fn project(
        _conn: &DatabaseConnection,
        _viewer: &AuthUser,
        target: recipes::Model,
    ) -> AppResult<RecipeSummary> {
        Ok(recipe_service::recipe_summary(target))
    }
}

pub struct CartEntry;

impl MembershipKind for CartEntry {
    type Entity = shopping_cart::Entity;
    type Target = recipes::Model;
    type Payload = RecipeSummary;

    const RESOURCE: &'static str = "shopping_cart";
    const DUPLICATE_MESSAGE: &'static str = "Recipe is already in the shopping cart";

    fn owner_column() -> shopping_cart::Column {
        shopping_cart::Column::UserId
    }

    fn target_column() -> shopping_cart::Column {
        shopping_cart::Column::RecipeId
    }

    fn new_record(user_id: Uuid, target_id: Uuid) -> shopping_cart::ActiveModel {
        shopping_cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(Some(user_id)),
            recipe_id: Set(Some(target_id)),
            created_at: NotSet,
        }
    }

    async fn load_target(conn: &DatabaseConnection, target_id: Uuid) -> AppResult<recipes::Model> {
        recipe_service::find_recipe(conn, target_id).await
    }

    async fn project(
        _conn: &DatabaseConnection,
        _viewer: &AuthUser,
        target: recipes::Model,
    ) -> AppResult<RecipeSummary> {
        Ok(recipe_service::recipe_summary(target))
    }
}

pub struct Follow;

impl MembershipKind for Follow {
    type Entity = follows::Entity;
    type Target = users::Model;
    type Payload = Subscription;

    const RESOURCE: &'static str = "follows";
    const DUPLICATE_MESSAGE: &'static str = "You are already subscribed to this author";

    fn owner_column() -> follows::Column {
        follows::Column::UserId
    }

    fn target_column() -> follows::Column {
        follows::Column::FollowingId
    }

    fn new_record(user_id: Uuid, target_id: Uuid) -> follows::ActiveModel {
        follows::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(Some(user_id)),
            following_id: Set(Some(target_id)),
            created_at: NotSet,
        }
    }

    fn precondition(user: &AuthUser, target_id: Uuid) -> AppResult<()> {
        if user.user_id == target_id {
            return Err(AppError::SelfReferenceNotAllowed);
        }
        Ok(())
    }

    async fn load_target(conn: &DatabaseConnection, target_id: Uuid) -> AppResult<users::Model> {
        user_service::find_user(conn, target_id).await
    }

    async fn project(
        conn: &DatabaseConnection,
        viewer: &AuthUser,
        target: users::Model,
    ) -> AppResult<Subscription> {
        user_service::subscription_for(conn, Some(viewer), target).await
    }
}
