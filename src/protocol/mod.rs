//! Protocol types for the HTTP interface
//!
//! Request and response bodies exchanged with external callers.

mod artifact;

pub use artifact::{
    AllStatesResponse, ArtifactAndUser, ArtifactAndUserQuery, CommandResponse, ExtResponse,
    INTERNAL_QUERY_ERROR,
};
