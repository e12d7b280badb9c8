use axum::{
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use foodgram_api::{
    db::{create_orm_conn, run_migrations},
    dto::recipes::{IngredientAmount, RecipeWriteRequest},
    entity::{
        Favorites, Users, favorites, ingredients::ActiveModel as IngredientActive,
        tags::ActiveModel as TagActive, users::ActiveModel as UserActive,
    },
    error::{AppError, is_unique_violation},
    middleware::auth::AuthUser,
    routes::{
        params::{Pagination, RecipeQuery},
        recipes,
    },
    services::{
        membership::{self, CartEntry, Favorite, Follow},
        recipe_service, shopping_list, user_service,
    },
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, Set,
    Statement,
};
use uuid::Uuid;

// Integration flow: two recipes sharing an ingredient go into the cart, the
// shopping list sums them; duplicate, missing and self-targeted toggles fail.
#[tokio::test]
async fn shopping_list_and_membership_flow() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let state = setup_state(&database_url).await?;

    let author_id = create_user(&state, "author", "author@example.com").await?;
    let cook_id = create_user(&state, "cook", "cook@example.com").await?;
    let author = AuthUser {
        user_id: author_id,
        role: "user".into(),
    };
    let cook = AuthUser {
        user_id: cook_id,
        role: "user".into(),
    };

    let tag = create_tag(&state, "Breakfast", "breakfast").await?;
    let flour = create_ingredient(&state, "flour", "g").await?;
    let sugar = create_ingredient(&state, "sugar", "g").await?;

    let bread = recipe_service::create_recipe(
        &state,
        &author,
        recipe("Bread", tag, &[(flour, 200)]),
    )
    .await?
    .data
    .expect("created recipe");
    let cake = recipe_service::create_recipe(
        &state,
        &author,
        recipe("Cake", tag, &[(flour, 100), (sugar, 50)]),
    )
    .await?
    .data
    .expect("created recipe");

    match recipe_service::create_recipe(
        &state,
        &author,
        recipe("Ghost", tag, &[(Uuid::new_v4(), 10)]),
    )
    .await
    {
        Err(AppError::Validation(_)) => {}
        other => panic!("expected validation error for unknown ingredient, got {other:?}"),
    }

    // Empty cart still yields the header.
    let empty = shopping_list::build_shopping_list(&state, &cook).await?;
    assert_eq!(empty, "Shopping list:\n\n");

    let summary = membership::add::<CartEntry>(&state, &cook, bread.id).await?;
    assert_eq!(summary.name, "Bread");
    membership::add::<CartEntry>(&state, &cook, cake.id).await?;

    let list = shopping_list::build_shopping_list(&state, &cook).await?;
    assert_eq!(list, "Shopping list:\n\nflour: 300 g\nsugar: 50 g\n");

    // Another user's cart is independent.
    let authors_list = shopping_list::build_shopping_list(&state, &author).await?;
    assert_eq!(authors_list, "Shopping list:\n\n");

    // Favorites reject duplicates and report removal of missing rows.
    membership::add::<Favorite>(&state, &cook, bread.id).await?;
    match membership::add::<Favorite>(&state, &cook, bread.id).await {
        Err(AppError::DuplicateMembership(_)) => {}
        other => panic!("expected duplicate membership, got {other:?}"),
    }
    match membership::remove::<Favorite>(&state, &cook, cake.id).await {
        Err(AppError::NotFound) => {}
        other => panic!("expected not found, got {other:?}"),
    }
    match membership::add::<Favorite>(&state, &cook, Uuid::new_v4()).await {
        Err(AppError::NotFound) => {}
        other => panic!("expected not found for unknown recipe, got {other:?}"),
    }

    // Favorite and cart flags show up for the viewer and drive the filters.
    let favorited = recipe_service::list_recipes(
        &state,
        Some(&cook),
        RecipeQuery {
            is_favorited: Some(true),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("recipe list")
    .items;
    assert_eq!(favorited.len(), 1);
    assert_eq!(favorited[0].id, bread.id);
    assert_eq!(favorited[0].is_favorited, Some(true));
    assert_eq!(favorited[0].is_in_shopping_cart, Some(true));

    membership::remove::<Favorite>(&state, &cook, bread.id).await?;
    membership::remove::<CartEntry>(&state, &cook, cake.id).await?;
    let list = shopping_list::build_shopping_list(&state, &cook).await?;
    assert_eq!(list, "Shopping list:\n\nflour: 200 g\n");

    // Handlers answer 201/204 and serve the list as a text attachment.
    let response = recipes::add_favorite(State(state.clone()), cook.clone(), Path(cake.id))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::CREATED);
    let response = recipes::remove_favorite(State(state.clone()), cook.clone(), Path(cake.id))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = recipes::remove_favorite(State(state.clone()), cook.clone(), Path(cake.id))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = recipes::download_shopping_cart(State(state.clone()), cook.clone())
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"shopping-list.txt\""
    );
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    assert_eq!(&body[..], b"Shopping list:\n\nflour: 200 g\n");

    // Identical concurrent adds leave exactly one row.
    let (first, second) = tokio::join!(
        membership::add::<Favorite>(&state, &cook, cake.id),
        membership::add::<Favorite>(&state, &cook, cake.id),
    );
    let failure = match (first, second) {
        (Ok(_), Err(err)) | (Err(err), Ok(_)) => err,
        (first, second) => panic!("expected one success, got {first:?} and {second:?}"),
    };
    assert!(matches!(failure, AppError::DuplicateMembership(_)));
    let rows = Favorites::find()
        .filter(favorites::Column::UserId.eq(cook_id))
        .filter(favorites::Column::RecipeId.eq(cake.id))
        .count(&state.orm)
        .await?;
    assert_eq!(rows, 1);

    // The unique index rejects a second row for the same pair.
    let err = favorites::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(Some(cook_id)),
        recipe_id: Set(Some(cake.id)),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await
    .expect_err("duplicate favorite row");
    assert!(is_unique_violation(&err));
    membership::remove::<Favorite>(&state, &cook, cake.id).await?;

    // A token outliving its account is refused.
    let ghost_id = create_user(&state, "user", "ghost@example.com").await?;
    Users::delete_by_id(ghost_id).exec(&state.orm).await?;
    let ghost = AuthUser {
        user_id: ghost_id,
        role: "user".into(),
    };
    match membership::add::<Favorite>(&state, &ghost, cake.id).await {
        Err(AppError::Unauthorized(_)) => {}
        other => panic!("expected unauthorized for a deleted account, got {other:?}"),
    }

    // Subscriptions.
    match membership::add::<Follow>(&state, &cook, cook_id).await {
        Err(AppError::SelfReferenceNotAllowed) => {}
        other => panic!("expected self reference error, got {other:?}"),
    }
    let subscription = membership::add::<Follow>(&state, &cook, author_id).await?;
    assert!(subscription.is_subscribed);
    assert_eq!(subscription.recipes_count, 2);

    let subscriptions =
        user_service::list_subscriptions(&state, &cook, Pagination::default()).await?;
    let items = subscriptions.data.expect("subscriptions").items;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, author_id);

    membership::remove::<Follow>(&state, &cook, author_id).await?;
    match membership::remove::<Follow>(&state, &cook, author_id).await {
        Err(AppError::NotFound) => {}
        other => panic!("expected not found, got {other:?}"),
    }

    // Only the author may delete; deletion drops the recipe from carts.
    match recipe_service::delete_recipe(&state, &cook, bread.id).await {
        Err(AppError::Forbidden) => {}
        other => panic!("expected forbidden, got {other:?}"),
    }
    recipe_service::delete_recipe(&state, &author, bread.id).await?;
    let list = shopping_list::build_shopping_list(&state, &cook).await?;
    assert_eq!(list, "Shopping list:\n\n");

    Ok(())
}

fn recipe(name: &str, tag: Uuid, lines: &[(Uuid, i32)]) -> RecipeWriteRequest {
    RecipeWriteRequest {
        tags: vec![tag],
        ingredients: lines
            .iter()
            .map(|(id, amount)| IngredientAmount {
                id: *id,
                amount: *amount,
            })
            .collect(),
        name: name.into(),
        image: "data:image/png;base64,iVBORw0KGgo=".into(),
        text: format!("How to make {name}."),
        cooking_time: 30,
    }
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE follows, shopping_cart, favorites, recipe_ingredients, recipe_tags, recipes, ingredients, tags, audit_logs, users RESTART IDENTITY CASCADE",
    ))
    .await?;

    Ok(AppState { orm })
}

async fn create_user(state: &AppState, role: &str, email: &str) -> anyhow::Result<Uuid> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        username: Set(email.split('@').next().unwrap_or(email).to_string()),
        first_name: Set("Test".into()),
        last_name: Set("User".into()),
        password_hash: Set("dummy".into()),
        role: Set(role.into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(user.id)
}

async fn create_tag(state: &AppState, name: &str, slug: &str) -> anyhow::Result<Uuid> {
    let tag = TagActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.into()),
        color: Set(Some("#E26C2D".into())),
        slug: Set(Some(slug.into())),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(tag.id)
}

async fn create_ingredient(state: &AppState, name: &str, unit: &str) -> anyhow::Result<Uuid> {
    let ingredient = IngredientActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.into()),
        measurement_unit: Set(unit.into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(ingredient.id)
}
