//! Artifact state endpoints

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};

use crate::api::state::AppState;
use crate::protocol::{
    AllStatesResponse, ArtifactAndUser, ArtifactAndUserQuery, CommandResponse, ExtResponse,
};

/// GET /artifactState/isArtifactReadByUser
pub async fn is_artifact_read_by_user_query(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ArtifactAndUserQuery>,
) -> Json<ExtResponse> {
    let req = ArtifactAndUser::from(params);
    Json(state.gateway.is_artifact_read_by_user(&req).await)
}

/// POST /artifactState/isArtifactReadByUser
pub async fn is_artifact_read_by_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ArtifactAndUser>,
) -> Json<ExtResponse> {
    Json(state.gateway.is_artifact_read_by_user(&req).await)
}

/// GET /artifactState/isArtifactInUserFeed
pub async fn is_artifact_in_user_feed_query(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ArtifactAndUserQuery>,
) -> Json<ExtResponse> {
    let req = ArtifactAndUser::from(params);
    Json(state.gateway.is_artifact_in_user_feed(&req).await)
}

/// POST /artifactState/isArtifactInUserFeed
pub async fn is_artifact_in_user_feed(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ArtifactAndUser>,
) -> Json<ExtResponse> {
    Json(state.gateway.is_artifact_in_user_feed(&req).await)
}

/// GET /artifactState/getAllStates
pub async fn get_all_states_query(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ArtifactAndUserQuery>,
) -> Json<AllStatesResponse> {
    let req = ArtifactAndUser::from(params);
    Json(state.gateway.get_all_states(&req).await)
}

/// POST /artifactState/getAllStates
pub async fn get_all_states(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ArtifactAndUser>,
) -> Json<AllStatesResponse> {
    Json(state.gateway.get_all_states(&req).await)
}

/// POST /artifactState/setArtifactReadByUser
pub async fn set_artifact_read_by_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ArtifactAndUser>,
) -> Json<CommandResponse> {
    Json(state.gateway.set_artifact_read_by_user(&req).await)
}

/// POST /artifactState/setArtifactAddedToUserFeed
pub async fn set_artifact_added_to_user_feed(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ArtifactAndUser>,
) -> Json<CommandResponse> {
    Json(state.gateway.set_artifact_added_to_user_feed(&req).await)
}

/// POST /artifactState/setArtifactRemovedFromUserFeed
pub async fn set_artifact_removed_from_user_feed(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ArtifactAndUser>,
) -> Json<CommandResponse> {
    Json(state.gateway.set_artifact_removed_from_user_feed(&req).await)
}
