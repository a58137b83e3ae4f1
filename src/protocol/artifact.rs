//! Artifact state request/response bodies
//!
//! Response fields are declared in alphabetical order so the JSON keys come
//! out sorted.

use serde::{Deserialize, Serialize};

use crate::types::EntityKey;

/// Reported when an entity answers with a reply of the wrong kind
pub const INTERNAL_QUERY_ERROR: &str = "Internal Query Error: this shouldn't happen.";

fn default_artifact_id() -> i64 {
    1
}

fn default_user_id() -> String {
    "test".to_string()
}

/// Request body naming one artifact of one user.
///
/// Missing fields fall back to `artifactId = 1`, `userId = "test"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactAndUser {
    #[serde(rename = "artifactId", default = "default_artifact_id")]
    pub artifact_id: i64,
    #[serde(rename = "userId", default = "default_user_id")]
    pub user_id: String,
}

impl ArtifactAndUser {
    pub fn new(artifact_id: i64, user_id: impl Into<String>) -> Self {
        Self {
            artifact_id,
            user_id: user_id.into(),
        }
    }

    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.artifact_id, self.user_id.clone())
    }
}

impl Default for ArtifactAndUser {
    fn default() -> Self {
        Self::new(default_artifact_id(), default_user_id())
    }
}

/// Query string variant; both parameters are required
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactAndUserQuery {
    #[serde(rename = "artifactId")]
    pub artifact_id: i64,
    #[serde(rename = "userId")]
    pub user_id: String,
}

impl From<ArtifactAndUserQuery> for ArtifactAndUser {
    fn from(query: ArtifactAndUserQuery) -> Self {
        Self::new(query.artifact_id, query.user_id)
    }
}

/// Answer to a single yes/no query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtResponse {
    /// `null` on failure
    pub answer: Option<bool>,
    #[serde(rename = "artifactId")]
    pub artifact_id: i64,
    #[serde(
        rename = "failureMsg",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub failure_msg: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: String,
}

impl ExtResponse {
    pub fn answered(req: &ArtifactAndUser, answer: bool) -> Self {
        Self {
            answer: Some(answer),
            artifact_id: req.artifact_id,
            failure_msg: None,
            user_id: req.user_id.clone(),
        }
    }

    pub fn failed(req: &ArtifactAndUser, failure_msg: impl Into<String>) -> Self {
        Self {
            answer: None,
            artifact_id: req.artifact_id,
            failure_msg: Some(failure_msg.into()),
            user_id: req.user_id.clone(),
        }
    }
}

/// Both flags of one artifact/user pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllStatesResponse {
    #[serde(rename = "artifactId")]
    pub artifact_id: i64,
    #[serde(rename = "artifactInUserFeed")]
    pub artifact_in_user_feed: Option<bool>,
    #[serde(rename = "artifactRead")]
    pub artifact_read: Option<bool>,
    #[serde(
        rename = "failureMsg",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub failure_msg: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: String,
}

impl AllStatesResponse {
    pub fn answered(req: &ArtifactAndUser, read: bool, in_feed: bool) -> Self {
        Self {
            artifact_id: req.artifact_id,
            artifact_in_user_feed: Some(in_feed),
            artifact_read: Some(read),
            failure_msg: None,
            user_id: req.user_id.clone(),
        }
    }

    pub fn failed(req: &ArtifactAndUser, failure_msg: impl Into<String>) -> Self {
        Self {
            artifact_id: req.artifact_id,
            artifact_in_user_feed: None,
            artifact_read: None,
            failure_msg: Some(failure_msg.into()),
            user_id: req.user_id.clone(),
        }
    }
}

/// Outcome of a mutating command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let req: ArtifactAndUser = serde_json::from_str("{}").unwrap();
        assert_eq!(req, ArtifactAndUser::new(1, "test"));

        let req: ArtifactAndUser = serde_json::from_str(r#"{"userId":"u"}"#).unwrap();
        assert_eq!(req, ArtifactAndUser::new(1, "u"));
    }

    #[test]
    fn test_ext_response_keys_are_sorted() {
        let req = ArtifactAndUser::new(42, "new");

        let json = serde_json::to_string(&ExtResponse::answered(&req, true)).unwrap();
        assert_eq!(json, r#"{"answer":true,"artifactId":42,"userId":"new"}"#);

        let json = serde_json::to_string(&ExtResponse::failed(&req, "boom")).unwrap();
        assert_eq!(
            json,
            r#"{"answer":null,"artifactId":42,"failureMsg":"boom","userId":"new"}"#
        );
    }

    #[test]
    fn test_all_states_keys_are_sorted() {
        let req = ArtifactAndUser::new(1, "a");

        let json = serde_json::to_string(&AllStatesResponse::answered(&req, true, false)).unwrap();
        assert_eq!(
            json,
            r#"{"artifactId":1,"artifactInUserFeed":false,"artifactRead":true,"userId":"a"}"#
        );

        let json = serde_json::to_string(&AllStatesResponse::failed(&req, "late")).unwrap();
        assert_eq!(
            json,
            r#"{"artifactId":1,"artifactInUserFeed":null,"artifactRead":null,"failureMsg":"late","userId":"a"}"#
        );
    }

    #[test]
    fn test_query_requires_both_parameters() {
        assert!(serde_json::from_str::<ArtifactAndUserQuery>(r#"{"artifactId":1}"#).is_err());
    }
}
