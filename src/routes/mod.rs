use axum::Router;

use crate::state::AppState;

pub mod auth;
pub mod doc;
pub mod health;
pub mod ingredients;
pub mod params;
pub mod recipes;
pub mod tags;
pub mod users;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/tags", tags::router())
        .nest("/ingredients", ingredients::router())
        .nest("/recipes", recipes::router())
        .nest("/users", users::router())
}
