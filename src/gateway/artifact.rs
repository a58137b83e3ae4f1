//! Typed artifact state operations on top of the ask gateway
//!
//! Every error is turned into a response body here; callers above this
//! layer never see an `AskError`.

use tracing::error;

use super::{AskError, AskGateway};
use crate::protocol::{
    AllStatesResponse, ArtifactAndUser, CommandResponse, ExtResponse, INTERNAL_QUERY_ERROR,
};
use crate::types::{ArtifactCommand, ArtifactReply};

impl AskGateway {
    pub async fn is_artifact_read_by_user(&self, req: &ArtifactAndUser) -> ExtResponse {
        match self.ask(req.key(), ArtifactCommand::IsRead).await {
            Ok(ArtifactReply::ArtifactRead(read)) => ExtResponse::answered(req, read),
            Ok(other) => unexpected_query_reply(req, ArtifactCommand::IsRead, other),
            Err(err) => failed_query(req, ArtifactCommand::IsRead, err),
        }
    }

    pub async fn is_artifact_in_user_feed(&self, req: &ArtifactAndUser) -> ExtResponse {
        match self.ask(req.key(), ArtifactCommand::IsInFeed).await {
            Ok(ArtifactReply::ArtifactInUserFeed(in_feed)) => ExtResponse::answered(req, in_feed),
            Ok(other) => unexpected_query_reply(req, ArtifactCommand::IsInFeed, other),
            Err(err) => failed_query(req, ArtifactCommand::IsInFeed, err),
        }
    }

    pub async fn get_all_states(&self, req: &ArtifactAndUser) -> AllStatesResponse {
        match self.ask(req.key(), ArtifactCommand::GetAll).await {
            Ok(ArtifactReply::AllStates(state)) => {
                AllStatesResponse::answered(req, state.read, state.in_feed)
            }
            Ok(other) => {
                error!(
                    artifact_id = req.artifact_id,
                    user_id = %req.user_id,
                    reply = ?other,
                    "Unexpected reply to GetAll"
                );
                AllStatesResponse::failed(req, INTERNAL_QUERY_ERROR)
            }
            Err(err) => {
                error!(
                    artifact_id = req.artifact_id,
                    user_id = %req.user_id,
                    error = %err,
                    "GetAll failed"
                );
                AllStatesResponse::failed(req, err.to_string())
            }
        }
    }

    pub async fn set_artifact_read_by_user(&self, req: &ArtifactAndUser) -> CommandResponse {
        self.command(req, ArtifactCommand::SetRead).await
    }

    pub async fn set_artifact_added_to_user_feed(&self, req: &ArtifactAndUser) -> CommandResponse {
        self.command(req, ArtifactCommand::SetAddedToFeed).await
    }

    pub async fn set_artifact_removed_from_user_feed(
        &self,
        req: &ArtifactAndUser,
    ) -> CommandResponse {
        self.command(req, ArtifactCommand::SetRemovedFromFeed).await
    }

    async fn command(&self, req: &ArtifactAndUser, command: ArtifactCommand) -> CommandResponse {
        let success = match self.ask(req.key(), command).await {
            Ok(ArtifactReply::Okay) => true,
            Ok(other) => {
                error!(%command, reply = ?other, "Internal Command Error: this shouldn't happen.");
                false
            }
            Err(err) => {
                error!(
                    artifact_id = req.artifact_id,
                    user_id = %req.user_id,
                    %command,
                    error = %err,
                    "Command failed"
                );
                false
            }
        };
        CommandResponse { success }
    }
}

fn unexpected_query_reply(
    req: &ArtifactAndUser,
    command: ArtifactCommand,
    reply: ArtifactReply,
) -> ExtResponse {
    error!(
        artifact_id = req.artifact_id,
        user_id = %req.user_id,
        %command,
        reply = ?reply,
        "Unexpected reply to query"
    );
    ExtResponse::failed(req, INTERNAL_QUERY_ERROR)
}

fn failed_query(req: &ArtifactAndUser, command: ArtifactCommand, err: AskError) -> ExtResponse {
    error!(
        artifact_id = req.artifact_id,
        user_id = %req.user_id,
        %command,
        error = %err,
        "Query failed"
    );
    ExtResponse::failed(req, err.to_string())
}
