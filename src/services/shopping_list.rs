use std::collections::BTreeMap;

use sea_orm::{
    ColumnTrait, EntityTrait, FromQueryResult, JoinType, QueryFilter, QuerySelect, RelationTrait,
};

use crate::{
    entity::{
        RecipeIngredients, ingredients, recipe_ingredients, recipes, shopping_cart,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    state::AppState,
};

pub const SHOPPING_LIST_FILENAME: &str = "shopping-list.txt";
pub const SHOPPING_LIST_HEADER: &str = "Shopping list:";

/// A single ingredient line of some carted recipe, flattened with the
/// ingredient's name and unit.
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult)]
pub struct IngredientLine {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingItem {
    pub name: String,
    pub measurement_unit: String,
    pub total: i64,
}

/// Groups lines by `(name, measurement_unit)` and sums their amounts.
///
/// Grouping is by text, not by ingredient id, so two catalog rows with the
/// same name and unit collapse into one item. Output is ordered by name, then
/// unit.
pub fn consolidate<I>(lines: I) -> Vec<ShoppingItem>
where
    I: IntoIterator<Item = IngredientLine>,
{
    let mut groups: BTreeMap<(String, String), i64> = BTreeMap::new();
    for line in lines {
        *groups
            .entry((line.name, line.measurement_unit))
            .or_default() += i64::from(line.amount);
    }

    groups
        .into_iter()
        .map(|((name, measurement_unit), total)| ShoppingItem {
            name,
            measurement_unit,
            total,
        })
        .collect()
}

pub fn render(items: &[ShoppingItem]) -> String {
    let mut out = format!("{SHOPPING_LIST_HEADER}\n\n");
    for item in items {
        out.push_str(&format!(
            "{}: {} {}\n",
            item.name, item.total, item.measurement_unit
        ));
    }
    out
}

/// Every ingredient line of every recipe in the user's shopping cart.
pub async fn cart_lines(state: &AppState, user: &AuthUser) -> AppResult<Vec<IngredientLine>> {
    let lines = RecipeIngredients::find()
        .select_only()
        .column_as(ingredients::Column::Name, "name")
        .column_as(ingredients::Column::MeasurementUnit, "measurement_unit")
        .column_as(recipe_ingredients::Column::Amount, "amount")
        .join(
            JoinType::InnerJoin,
            recipe_ingredients::Relation::Ingredients.def(),
        )
        .join(JoinType::InnerJoin, recipe_ingredients::Relation::Recipes.def())
        .join(JoinType::InnerJoin, recipes::Relation::ShoppingCart.def())
        .filter(shopping_cart::Column::UserId.eq(user.user_id))
        .into_model::<IngredientLine>()
        .all(&state.orm)
        .await?;

    Ok(lines)
}

pub async fn build_shopping_list(state: &AppState, user: &AuthUser) -> AppResult<String> {
    let lines = cart_lines(state, user).await?;
    let line_count = lines.len();
    let items = consolidate(lines);

    tracing::debug!(
        user_id = %user.user_id,
        lines = line_count,
        items = items.len(),
        "shopping list built"
    );

    Ok(render(&items))
}
