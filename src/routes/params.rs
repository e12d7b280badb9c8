use serde::{Deserialize, Deserializer};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: Option<i64>,
    /// Page size.
    pub limit: Option<i64>,
}

impl Pagination {
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.limit.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1).saturating_mul(per_page);
        (page, per_page, offset)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RecipeQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub author: Option<Uuid>,
    /// Tag slugs, as repeated `tags` keys or comma-separated; a recipe
    /// matches when it carries any of them.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "flag")]
    pub is_favorited: Option<bool>,
    #[serde(default, deserialize_with = "flag")]
    pub is_in_shopping_cart: Option<bool>,
}

impl RecipeQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            limit: self.limit,
        }
    }

    pub fn tag_slugs(&self) -> Vec<String> {
        self.tags
            .iter()
            .flat_map(|raw| raw.split(','))
            .map(str::trim)
            .filter(|slug| !slug.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Accepts `true`/`false` as well as `1`/`0` in query strings.
fn flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some("1") | Some("true") | Some("True") => Ok(Some(true)),
        Some("0") | Some("false") | Some("False") => Ok(Some(false)),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a boolean, got `{other}`"
        ))),
    }
}
