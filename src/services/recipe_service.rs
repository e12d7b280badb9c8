use std::collections::{HashMap, HashSet};

use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, EntityTrait, FromQueryResult, IntoActiveModel, JoinType,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::recipes::{RecipeList, RecipeWriteRequest},
    entity::{
        Favorites, Follows, Ingredients, RecipeIngredients, RecipeTags, Recipes, ShoppingCart,
        Tags, Users, favorites, follows, ingredients, recipe_ingredients, recipe_tags, recipes,
        shopping_cart, tags, users,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_owner_or_admin},
    models::{Recipe, RecipeIngredient, RecipeSummary, Tag},
    response::{ApiResponse, Meta},
    routes::params::RecipeQuery,
    services::user_service::user_profile,
    state::AppState,
};

pub const MAX_NAME_LEN: usize = 200;

/// Write-boundary checks for recipe creation and update. Reference existence
/// is checked separately against the database.
pub fn validate_recipe(payload: &RecipeWriteRequest) -> AppResult<()> {
    if payload.ingredients.is_empty() {
        return Err(AppError::Validation(
            "a recipe needs at least one ingredient".into(),
        ));
    }
    if payload.tags.is_empty() {
        return Err(AppError::Validation("a recipe needs at least one tag".into()));
    }
    if payload.cooking_time < 1 {
        return Err(AppError::Validation(
            "cooking_time must be a positive number of minutes".into(),
        ));
    }

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("name must not be empty".into()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    if payload.text.trim().is_empty() {
        return Err(AppError::Validation("text must not be empty".into()));
    }
    if payload.image.trim().is_empty() {
        return Err(AppError::Validation("image must not be empty".into()));
    }

    let mut seen_tags = HashSet::new();
    if !payload.tags.iter().all(|id| seen_tags.insert(*id)) {
        return Err(AppError::Validation("tags must not repeat".into()));
    }

    let mut seen_ingredients = HashSet::new();
    for line in &payload.ingredients {
        if line.amount < 1 {
            return Err(AppError::Validation(format!(
                "amount of ingredient {} must be at least 1",
                line.id
            )));
        }
        if !seen_ingredients.insert(line.id) {
            return Err(AppError::Validation(format!(
                "ingredient {} is listed more than once",
                line.id
            )));
        }
    }

    Ok(())
}

pub fn recipe_summary(model: recipes::Model) -> RecipeSummary {
    RecipeSummary {
        id: model.id,
        name: model.name,
        image: model.image,
        cooking_time: model.cooking_time,
    }
}

pub async fn find_recipe(conn: &DatabaseConnection, id: Uuid) -> AppResult<recipes::Model> {
    Recipes::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn list_recipes(
    state: &AppState,
    viewer: Option<&AuthUser>,
    query: RecipeQuery,
) -> AppResult<ApiResponse<RecipeList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    if let Some(author) = query.author {
        condition = condition.add(recipes::Column::AuthorId.eq(author));
    }

    let slugs = query.tag_slugs();
    if !slugs.is_empty() {
        let tagged = Query::select()
            .column((RecipeTags, recipe_tags::Column::RecipeId))
            .from(RecipeTags)
            .inner_join(
                Tags,
                Expr::col((Tags, tags::Column::Id)).equals((RecipeTags, recipe_tags::Column::TagId)),
            )
            .and_where(tags::Column::Slug.is_in(slugs))
            .to_owned();
        condition = condition.add(recipes::Column::Id.in_subquery(tagged));
    }

    if let Some(viewer) = viewer {
        if query.is_favorited == Some(true) {
            let favorited = Query::select()
                .column((Favorites, favorites::Column::RecipeId))
                .from(Favorites)
                .and_where(favorites::Column::UserId.eq(viewer.user_id))
                .to_owned();
            condition = condition.add(recipes::Column::Id.in_subquery(favorited));
        }
        if query.is_in_shopping_cart == Some(true) {
            let carted = Query::select()
                .column((ShoppingCart, shopping_cart::Column::RecipeId))
                .from(ShoppingCart)
                .and_where(shopping_cart::Column::UserId.eq(viewer.user_id))
                .to_owned();
            condition = condition.add(recipes::Column::Id.in_subquery(carted));
        }
    }

    let finder = Recipes::find()
        .filter(condition)
        .order_by_desc(recipes::Column::CreatedAt)
        .order_by_asc(recipes::Column::Id);

    let total = finder.clone().count(&state.orm).await? as i64;

    let models = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let items = assemble(&state.orm, viewer, models).await?;
    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Recipes", RecipeList { items }, Some(meta)))
}

pub async fn get_recipe(
    state: &AppState,
    viewer: Option<&AuthUser>,
    id: Uuid,
) -> AppResult<ApiResponse<Recipe>> {
    let model = find_recipe(&state.orm, id).await?;
    let recipe = assemble_one(&state.orm, viewer, model).await?;
    Ok(ApiResponse::success("Recipe", recipe, None))
}

pub async fn create_recipe(
    state: &AppState,
    user: &AuthUser,
    payload: RecipeWriteRequest,
) -> AppResult<ApiResponse<Recipe>> {
    validate_recipe(&payload)?;

    let txn = state.orm.begin().await?;
    ensure_references(&txn, &payload).await?;

    let recipe = recipes::ActiveModel {
        id: Set(Uuid::new_v4()),
        author_id: Set(user.user_id),
        name: Set(payload.name.trim().to_string()),
        image: Set(payload.image.clone()),
        text: Set(payload.text.clone()),
        cooking_time: Set(payload.cooking_time),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    write_relations(&txn, recipe.id, &payload).await?;
    txn.commit().await?;

    audit::record(
        &state.orm,
        user.user_id,
        "recipe_create",
        "recipes",
        serde_json::json!({ "recipe_id": recipe.id }),
    )
    .await;
    tracing::info!(recipe_id = %recipe.id, author_id = %user.user_id, "recipe created");

    let recipe = assemble_one(&state.orm, Some(user), recipe).await?;
    Ok(ApiResponse::success("Recipe created", recipe, Some(Meta::empty())))
}

pub async fn update_recipe(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: RecipeWriteRequest,
) -> AppResult<ApiResponse<Recipe>> {
    let existing = find_recipe(&state.orm, id).await?;
    ensure_owner_or_admin(user, existing.author_id)?;
    validate_recipe(&payload)?;

    let txn = state.orm.begin().await?;
    ensure_references(&txn, &payload).await?;

    let mut active = existing.into_active_model();
    active.name = Set(payload.name.trim().to_string());
    active.image = Set(payload.image.clone());
    active.text = Set(payload.text.clone());
    active.cooking_time = Set(payload.cooking_time);
    let recipe = active.update(&txn).await?;

    RecipeTags::delete_many()
        .filter(recipe_tags::Column::RecipeId.eq(id))
        .exec(&txn)
        .await?;
    RecipeIngredients::delete_many()
        .filter(recipe_ingredients::Column::RecipeId.eq(id))
        .exec(&txn)
        .await?;
    write_relations(&txn, id, &payload).await?;
    txn.commit().await?;

    audit::record(
        &state.orm,
        user.user_id,
        "recipe_update",
        "recipes",
        serde_json::json!({ "recipe_id": id }),
    )
    .await;

    let recipe = assemble_one(&state.orm, Some(user), recipe).await?;
    Ok(ApiResponse::success("Updated", recipe, Some(Meta::empty())))
}

pub async fn delete_recipe(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<()> {
    let existing = find_recipe(&state.orm, id).await?;
    ensure_owner_or_admin(user, existing.author_id)?;

    let result = Recipes::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.orm,
        user.user_id,
        "recipe_delete",
        "recipes",
        serde_json::json!({ "recipe_id": id }),
    )
    .await;
    tracing::info!(recipe_id = %id, "recipe deleted");

    Ok(())
}

async fn ensure_references<C: ConnectionTrait>(
    conn: &C,
    payload: &RecipeWriteRequest,
) -> AppResult<()> {
    let known_tags: HashSet<Uuid> = Tags::find()
        .filter(tags::Column::Id.is_in(payload.tags.clone()))
        .all(conn)
        .await?
        .into_iter()
        .map(|tag| tag.id)
        .collect();
    if let Some(missing) = payload.tags.iter().find(|id| !known_tags.contains(id)) {
        return Err(AppError::Validation(format!("tag {missing} does not exist")));
    }

    let ingredient_ids: Vec<Uuid> = payload.ingredients.iter().map(|line| line.id).collect();
    let known_ingredients: HashSet<Uuid> = Ingredients::find()
        .filter(ingredients::Column::Id.is_in(ingredient_ids.clone()))
        .all(conn)
        .await?
        .into_iter()
        .map(|ingredient| ingredient.id)
        .collect();
    if let Some(missing) = ingredient_ids.iter().find(|id| !known_ingredients.contains(id)) {
        return Err(AppError::Validation(format!(
            "ingredient {missing} does not exist"
        )));
    }

    Ok(())
}

async fn write_relations<C: ConnectionTrait>(
    conn: &C,
    recipe_id: Uuid,
    payload: &RecipeWriteRequest,
) -> AppResult<()> {
    RecipeTags::insert_many(payload.tags.iter().map(|tag_id| recipe_tags::ActiveModel {
        recipe_id: Set(recipe_id),
        tag_id: Set(*tag_id),
    }))
    .exec_without_returning(conn)
    .await?;

    RecipeIngredients::insert_many(payload.ingredients.iter().map(|line| {
        recipe_ingredients::ActiveModel {
            id: Set(Uuid::new_v4()),
            recipe_id: Set(recipe_id),
            ingredient_id: Set(line.id),
            amount: Set(line.amount),
        }
    }))
    .exec_without_returning(conn)
    .await?;

    Ok(())
}

#[derive(Debug, FromQueryResult)]
struct TagRow {
    recipe_id: Uuid,
    id: Uuid,
    name: String,
    color: Option<String>,
    slug: Option<String>,
}

#[derive(Debug, FromQueryResult)]
struct IngredientRow {
    recipe_id: Uuid,
    id: Uuid,
    name: String,
    measurement_unit: String,
    amount: i32,
}

async fn assemble_one(
    conn: &DatabaseConnection,
    viewer: Option<&AuthUser>,
    model: recipes::Model,
) -> AppResult<Recipe> {
    assemble(conn, viewer, vec![model])
        .await?
        .into_iter()
        .next()
        .ok_or(AppError::NotFound)
}

/// Builds full recipe representations for a page of recipes with a fixed
/// number of queries, independent of the page size.
async fn assemble(
    conn: &DatabaseConnection,
    viewer: Option<&AuthUser>,
    models: Vec<recipes::Model>,
) -> AppResult<Vec<Recipe>> {
    if models.is_empty() {
        return Ok(Vec::new());
    }

    let recipe_ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();
    let author_ids: Vec<Uuid> = models
        .iter()
        .map(|m| m.author_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let mut tags_by_recipe: HashMap<Uuid, Vec<Tag>> = HashMap::new();
    for row in RecipeTags::find()
        .select_only()
        .column(recipe_tags::Column::RecipeId)
        .column_as(tags::Column::Id, "id")
        .column_as(tags::Column::Name, "name")
        .column_as(tags::Column::Color, "color")
        .column_as(tags::Column::Slug, "slug")
        .join(JoinType::InnerJoin, recipe_tags::Relation::Tags.def())
        .filter(recipe_tags::Column::RecipeId.is_in(recipe_ids.clone()))
        .order_by_asc(tags::Column::Name)
        .into_model::<TagRow>()
        .all(conn)
        .await?
    {
        tags_by_recipe.entry(row.recipe_id).or_default().push(Tag {
            id: row.id,
            name: row.name,
            color: row.color,
            slug: row.slug,
        });
    }

    let mut ingredients_by_recipe: HashMap<Uuid, Vec<RecipeIngredient>> = HashMap::new();
    for row in RecipeIngredients::find()
        .select_only()
        .column(recipe_ingredients::Column::RecipeId)
        .column_as(ingredients::Column::Id, "id")
        .column_as(ingredients::Column::Name, "name")
        .column_as(ingredients::Column::MeasurementUnit, "measurement_unit")
        .column(recipe_ingredients::Column::Amount)
        .join(
            JoinType::InnerJoin,
            recipe_ingredients::Relation::Ingredients.def(),
        )
        .filter(recipe_ingredients::Column::RecipeId.is_in(recipe_ids.clone()))
        .order_by_asc(ingredients::Column::Name)
        .into_model::<IngredientRow>()
        .all(conn)
        .await?
    {
        ingredients_by_recipe
            .entry(row.recipe_id)
            .or_default()
            .push(RecipeIngredient {
                id: row.id,
                name: row.name,
                measurement_unit: row.measurement_unit,
                amount: row.amount,
            });
    }

    let authors: HashMap<Uuid, _> = Users::find()
        .filter(users::Column::Id.is_in(author_ids.clone()))
        .all(conn)
        .await?
        .into_iter()
        .map(|user| (user.id, user))
        .collect();

    let (favorited, carted, followed) = match viewer {
        Some(viewer) => (
            Favorites::find()
                .filter(favorites::Column::UserId.eq(viewer.user_id))
                .filter(favorites::Column::RecipeId.is_in(recipe_ids.clone()))
                .all(conn)
                .await?
                .into_iter()
                .filter_map(|row| row.recipe_id)
                .collect::<HashSet<_>>(),
            ShoppingCart::find()
                .filter(shopping_cart::Column::UserId.eq(viewer.user_id))
                .filter(shopping_cart::Column::RecipeId.is_in(recipe_ids.clone()))
                .all(conn)
                .await?
                .into_iter()
                .filter_map(|row| row.recipe_id)
                .collect::<HashSet<_>>(),
            Follows::find()
                .filter(follows::Column::UserId.eq(viewer.user_id))
                .filter(follows::Column::FollowingId.is_in(author_ids))
                .all(conn)
                .await?
                .into_iter()
                .filter_map(|row| row.following_id)
                .collect::<HashSet<_>>(),
        ),
        None => Default::default(),
    };

    let mut recipes = Vec::with_capacity(models.len());
    for model in models {
        let author = authors
            .get(&model.author_id)
            .cloned()
            .ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!("author of recipe {} is missing", model.id))
            })?;
        let is_subscribed = followed.contains(&author.id);

        recipes.push(Recipe {
            id: model.id,
            tags: tags_by_recipe.remove(&model.id).unwrap_or_default(),
            author: user_profile(author, is_subscribed),
            ingredients: ingredients_by_recipe.remove(&model.id).unwrap_or_default(),
            is_favorited: viewer.map(|_| favorited.contains(&model.id)),
            is_in_shopping_cart: viewer.map(|_| carted.contains(&model.id)),
            name: model.name,
            image: model.image,
            text: model.text,
            cooking_time: model.cooking_time,
        });
    }

    Ok(recipes)
}
