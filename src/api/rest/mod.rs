//! REST API module for HTTP endpoints
//!
//! Queries accept the artifact/user pair either as query parameters (GET)
//! or as a JSON body (POST); commands only as a JSON body:
//! - `/artifactState/isArtifactReadByUser`
//! - `/artifactState/isArtifactInUserFeed`
//! - `/artifactState/getAllStates`
//! - `POST /artifactState/setArtifactReadByUser`
//! - `POST /artifactState/setArtifactAddedToUserFeed`
//! - `POST /artifactState/setArtifactRemovedFromUserFeed`
//!
//! Failures are reported inside the response body, always with status 200.

pub mod artifact_state;
