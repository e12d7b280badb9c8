use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

use crate::{
    dto::catalog::{IngredientList, IngredientQuery, TagList},
    entity::{Ingredients, Tags, ingredients, tags},
    error::{AppError, AppResult},
    models::{Ingredient, Tag},
    response::ApiResponse,
    state::AppState,
};

pub async fn list_tags(state: &AppState) -> AppResult<ApiResponse<TagList>> {
    let items = Tags::find()
        .order_by_asc(tags::Column::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(tag_from_entity)
        .collect();
    Ok(ApiResponse::success("Tags", TagList { items }, None))
}

pub async fn get_tag(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Tag>> {
    let tag = Tags::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(tag_from_entity)
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Tag", tag, None))
}

pub async fn list_ingredients(
    state: &AppState,
    query: IngredientQuery,
) -> AppResult<ApiResponse<IngredientList>> {
    let search = query
        .name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let mut finder = Ingredients::find().order_by_asc(ingredients::Column::Name);
    if let Some(search) = search {
        finder = finder.filter(
            Expr::col(ingredients::Column::Name).ilike(format!("%{}%", escape_like(search))),
        );
    }

    let items: Vec<Ingredient> = finder
        .all(&state.orm)
        .await?
        .into_iter()
        .map(ingredient_from_entity)
        .collect();

    let items = match search {
        Some(search) => rank_by_prefix(items, search),
        None => items,
    };

    Ok(ApiResponse::success("Ingredients", IngredientList { items }, None))
}

pub async fn get_ingredient(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Ingredient>> {
    let ingredient = Ingredients::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(ingredient_from_entity)
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Ingredient", ingredient, None))
}

/// Keeps ingredients whose name contains `search` (case-insensitive) and puts
/// those starting with it first. Each group stays sorted by name.
pub fn rank_by_prefix(mut items: Vec<Ingredient>, search: &str) -> Vec<Ingredient> {
    let needle = search.to_lowercase();
    items.retain(|item| item.name.to_lowercase().contains(&needle));
    items.sort_by_cached_key(|item| {
        let name = item.name.to_lowercase();
        (!name.starts_with(&needle), name)
    });
    items
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn tag_from_entity(model: tags::Model) -> Tag {
    Tag {
        id: model.id,
        name: model.name,
        color: model.color,
        slug: model.slug,
    }
}

fn ingredient_from_entity(model: ingredients::Model) -> Ingredient {
    Ingredient {
        id: model.id,
        name: model.name,
        measurement_unit: model.measurement_unit,
    }
}
