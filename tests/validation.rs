use axum::http::{StatusCode, Uri, header};
use axum_extra::extract::Query;
use foodgram_api::{
    dto::recipes::{IngredientAmount, RecipeWriteRequest},
    error::AppError,
    models::Ingredient,
    routes::{
        params::{Pagination, RecipeQuery},
        recipes::attachment_headers,
    },
    services::{
        catalog_service::rank_by_prefix, recipe_service::validate_recipe,
        shopping_list::SHOPPING_LIST_FILENAME,
    },
};
use uuid::Uuid;

fn valid_request() -> RecipeWriteRequest {
    RecipeWriteRequest {
        tags: vec![Uuid::new_v4()],
        ingredients: vec![
            IngredientAmount {
                id: Uuid::new_v4(),
                amount: 200,
            },
            IngredientAmount {
                id: Uuid::new_v4(),
                amount: 2,
            },
        ],
        name: "Pancakes".into(),
        image: "data:image/png;base64,iVBORw0KGgo=".into(),
        text: "Mix and fry.".into(),
        cooking_time: 15,
    }
}

fn assert_invalid(payload: &RecipeWriteRequest) {
    match validate_recipe(payload) {
        Err(AppError::Validation(_)) => {}
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn accepts_a_complete_recipe() {
    assert!(validate_recipe(&valid_request()).is_ok());
}

#[test]
fn rejects_recipe_without_ingredients() {
    let mut payload = valid_request();
    payload.ingredients.clear();
    assert_invalid(&payload);
}

#[test]
fn rejects_recipe_without_tags() {
    let mut payload = valid_request();
    payload.tags.clear();
    assert_invalid(&payload);
}

#[test]
fn rejects_non_positive_cooking_time() {
    let mut payload = valid_request();
    payload.cooking_time = 0;
    assert_invalid(&payload);
}

#[test]
fn rejects_zero_amount() {
    let mut payload = valid_request();
    payload.ingredients[0].amount = 0;
    assert_invalid(&payload);
}

#[test]
fn rejects_repeated_ingredient() {
    let mut payload = valid_request();
    payload.ingredients[1].id = payload.ingredients[0].id;
    assert_invalid(&payload);
}

#[test]
fn rejects_repeated_tag() {
    let mut payload = valid_request();
    payload.tags.push(payload.tags[0]);
    assert_invalid(&payload);
}

#[test]
fn rejects_blank_name_and_overlong_name() {
    let mut payload = valid_request();
    payload.name = "   ".into();
    assert_invalid(&payload);

    payload.name = "x".repeat(201);
    assert_invalid(&payload);
}

#[test]
fn ingredient_prefix_matches_come_first() {
    let ingredient = |name: &str| Ingredient {
        id: Uuid::new_v4(),
        name: name.into(),
        measurement_unit: "g".into(),
    };
    let ranked = rank_by_prefix(
        vec![
            ingredient("brown sugar"),
            ingredient("salt"),
            ingredient("sugar"),
            ingredient("icing sugar"),
        ],
        "sug",
    );

    let names: Vec<_> = ranked.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, ["sugar", "brown sugar", "icing sugar"]);
}

#[test]
fn pagination_defaults_and_clamps() {
    assert_eq!(Pagination::default().normalize(), (1, 20, 0));

    let big = Pagination {
        page: Some(3),
        limit: Some(1000),
    };
    assert_eq!(big.normalize(), (3, 100, 200));

    let negative = Pagination {
        page: Some(-4),
        limit: Some(0),
    };
    assert_eq!(negative.normalize(), (1, 1, 0));
}

#[test]
fn huge_page_number_saturates_the_offset() {
    let huge = Pagination {
        page: Some(i64::MAX),
        limit: Some(100),
    };
    let (page, per_page, offset) = huge.normalize();
    assert_eq!((page, per_page), (i64::MAX, 100));
    assert_eq!(offset, i64::MAX);
}

#[test]
fn tag_filter_splits_comma_separated_slugs() {
    let query = RecipeQuery {
        tags: vec!["breakfast, dinner,,".into()],
        ..Default::default()
    };
    assert_eq!(query.tag_slugs(), ["breakfast", "dinner"]);
    assert!(RecipeQuery::default().tag_slugs().is_empty());
}

#[test]
fn recipe_query_accepts_repeated_tags() {
    let uri: Uri = "/api/recipes?tags=breakfast&tags=lunch&is_favorited=1&page=2"
        .parse()
        .expect("valid uri");
    let Query(query) = Query::<RecipeQuery>::try_from_uri(&uri).expect("query parses");

    assert_eq!(query.tag_slugs(), ["breakfast", "lunch"]);
    assert_eq!(query.is_favorited, Some(true));
    assert_eq!(query.page, Some(2));
}

#[test]
fn recipe_query_accepts_a_single_comma_separated_tags_value() {
    let uri: Uri = "/api/recipes?tags=breakfast,dinner".parse().expect("valid uri");
    let Query(query) = Query::<RecipeQuery>::try_from_uri(&uri).expect("query parses");
    assert_eq!(query.tag_slugs(), ["breakfast", "dinner"]);
}

#[test]
fn malformed_recipe_query_becomes_a_bad_request() {
    let uri: Uri = "/api/recipes?is_favorited=maybe".parse().expect("valid uri");
    let rejection = Query::<RecipeQuery>::try_from_uri(&uri).expect_err("flag is invalid");
    assert_eq!(AppError::from(rejection).status(), StatusCode::BAD_REQUEST);
}

#[test]
fn shopping_list_is_served_as_a_text_attachment() {
    let headers = attachment_headers(SHOPPING_LIST_FILENAME);
    assert_eq!(
        headers,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"shopping-list.txt\"".to_string(),
            ),
        ]
    );
}

#[test]
fn error_kinds_map_to_status_codes() {
    assert_eq!(AppError::NotFound.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        AppError::DuplicateMembership("dup".into()).status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        AppError::SelfReferenceNotAllowed.status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        AppError::Validation("bad".into()).status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        AppError::Unauthorized("no token".into()).status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(AppError::Forbidden.status(), StatusCode::FORBIDDEN);
}
