//! HTTP server setup with Axum

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::rest::artifact_state;
use super::state::AppState;

/// Create the Axum router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Queries
        .route(
            "/artifactState/isArtifactReadByUser",
            get(artifact_state::is_artifact_read_by_user_query)
                .post(artifact_state::is_artifact_read_by_user),
        )
        .route(
            "/artifactState/isArtifactInUserFeed",
            get(artifact_state::is_artifact_in_user_feed_query)
                .post(artifact_state::is_artifact_in_user_feed),
        )
        .route(
            "/artifactState/getAllStates",
            get(artifact_state::get_all_states_query).post(artifact_state::get_all_states),
        )
        // Commands
        .route(
            "/artifactState/setArtifactReadByUser",
            post(artifact_state::set_artifact_read_by_user),
        )
        .route(
            "/artifactState/setArtifactAddedToUserFeed",
            post(artifact_state::set_artifact_added_to_user_feed),
        )
        .route(
            "/artifactState/setArtifactRemovedFromUserFeed",
            post(artifact_state::set_artifact_removed_from_user_feed),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
