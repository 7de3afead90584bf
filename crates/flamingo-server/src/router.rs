use axum::routing::{get, post};
use axum::Router;

use crate::handler;
use crate::state::AppState;

/// Build the axum router with all Flamingo endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handler::ping))
        .route("/v1/health", get(handler::health))
        .route(
            "/v1/projects",
            get(handler::list_projects).post(handler::create_project),
        )
        .route(
            "/v1/projects/:id",
            get(handler::get_project)
                .patch(handler::update_project)
                .delete(handler::delete_project),
        )
        .route(
            "/v1/projects/:id/items",
            get(handler::list_items).post(handler::ingest_items),
        )
        .route("/v1/projects/:id/items/known", post(handler::known_items))
        .route("/v1/projects/:id/items/unknown", post(handler::unknown_keys))
        .route("/v1/projects/:id/steps/:step", get(handler::batch_items))
        .route(
            "/v1/items/:id",
            get(handler::get_item).delete(handler::delete_item),
        )
        .with_state(state)
}
